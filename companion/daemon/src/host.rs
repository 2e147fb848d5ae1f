//! Companion Host
//!
//! Builds the core components from the resolved configuration and runs the
//! stdin command loop. Responsibilities:
//! - Wires transport, pipeline, dispatcher and the interaction system
//! - Writes every dispatched action to stdout as a JSON line
//! - Turns stdin lines into chat turns or control commands
//! - Marks the shared context busy while a turn is running

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use companion_core::coordinator::install_global;
use companion_core::{
    ActionDispatcher, ChatPipeline, CompanionConfig, ContextManager, ContextUpdate, HttpTransport,
    InteractionSystem, OutputAction, PipelineOptions, PriorityDisplay, SystemClock, TracingDisplay,
    TurnOutcome,
};

/// One parsed stdin line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Send as a chat message
    Chat(String),
    /// Stop the current reply
    Interrupt,
    /// Forget the conversation
    Clear,
    /// Log the coordinator status
    Status,
    /// Blank line
    Nothing,
}

impl Command {
    /// Parse one line of input
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "" => Self::Nothing,
            "/interrupt" => Self::Interrupt,
            "/clear" => Self::Clear,
            "/status" => Self::Status,
            text => Self::Chat(text.to_string()),
        }
    }
}

/// Write `action` to stdout as one JSON line
fn print_action(action: &OutputAction) -> Result<()> {
    let line = serde_json::to_string(action)?;
    println!("{line}");
    Ok(())
}

/// Runs chat turns and owns the context's busy flag while they are in flight
///
/// Only the most recent chat turn may clear the flag. A turn superseded by a
/// newer chat turn leaves it set; a turn cut short by anything else (an
/// interrupt, a spoken greeting) clears it.
pub struct ChatTurns {
    pipeline: Arc<ChatPipeline>,
    context: Arc<ContextManager>,
    latest: AtomicU64,
}

impl ChatTurns {
    /// Turn runner over `pipeline`, reporting into `context`
    pub fn new(pipeline: Arc<ChatPipeline>, context: Arc<ContextManager>) -> Self {
        Self {
            pipeline,
            context,
            latest: AtomicU64::new(0),
        }
    }

    /// Mark the user as busy and run `text` as a chat turn in the background
    pub fn spawn(self: &Arc<Self>, text: String) -> JoinHandle<TurnOutcome> {
        let turn = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        self.context
            .update(ContextUpdate::new().interacted_now().busy(true));

        let turns = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = turns.pipeline.chat(&text).await;
            turns.finish(turn);
            match outcome {
                TurnOutcome::Failed => warn!("chat turn failed"),
                outcome => debug!(turn, ?outcome, "chat turn finished"),
            }
            outcome
        })
    }

    fn finish(&self, turn: u64) {
        if self.latest.load(Ordering::SeqCst) == turn {
            self.context.update(ContextUpdate::new().busy(false));
        } else {
            debug!(turn, "superseded by a newer chat turn");
        }
    }
}

/// Owns the running companion
pub struct CompanionHost {
    pipeline: Arc<ChatPipeline>,
    system: Arc<Mutex<InteractionSystem>>,
    context: Arc<ContextManager>,
    turns: Arc<ChatTurns>,
}

impl CompanionHost {
    /// Build every component from `config`
    pub fn new(config: CompanionConfig) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(config.server.clone())?);
        let display = Arc::new(PriorityDisplay::new(TracingDisplay));
        let pipeline = Arc::new(ChatPipeline::new(
            transport,
            display,
            None,
            PipelineOptions::from_config(&config),
        ));

        let dispatcher = Arc::new(ActionDispatcher::new(pipeline.clone()));
        dispatcher.add_listener(print_action);

        let system = InteractionSystem::with_default_modules(
            config.interaction.clone(),
            dispatcher,
            Arc::new(SystemClock),
        );
        let context = system.context();
        let system = install_global(system)
            .map_err(|_| anyhow!("an interaction system is already installed"))?;

        let turns = Arc::new(ChatTurns::new(Arc::clone(&pipeline), Arc::clone(&context)));

        Ok(Self {
            pipeline,
            system,
            context,
            turns,
        })
    }

    /// Start the interaction system, then fire `triggers`
    pub fn start(&self, triggers: &[String]) {
        let mut system = self.system.lock();
        system.start();
        for event in triggers {
            system.trigger_event(event);
        }
    }

    /// Read stdin until EOF
    pub async fn run(&self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        while let Some(line) = lines.next_line().await? {
            match Command::parse(&line) {
                Command::Chat(text) => {
                    self.turns.spawn(text);
                }
                Command::Interrupt => {
                    self.pipeline.interrupt_current_playback();
                    self.context.update(ContextUpdate::new().busy(false));
                }
                Command::Clear => {
                    self.pipeline.clear_history();
                    info!("conversation cleared");
                }
                Command::Status => self.log_status()?,
                Command::Nothing => {}
            }
        }

        debug!("stdin closed");
        Ok(())
    }

    fn log_status(&self) -> Result<()> {
        let status = self.system.lock().status();
        info!(
            status = %serde_json::to_string(&status)?,
            pipeline = ?self.pipeline,
            idle_for = ?self.context.idle_for(),
            "status"
        );
        Ok(())
    }

    /// Stop the interaction system and silence the companion
    pub fn shutdown(&self) {
        self.system.lock().stop();
        self.pipeline.interrupt_current_playback();
    }
}

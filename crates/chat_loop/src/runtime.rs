use std::fmt::Display;
use std::time::Duration;

use chat_core::{SettingsSnapshot, Turn, UserRef};
use chat_state::{
    Effect, ServiceKind, SessionContext, SessionEvent, SessionState, StateMachine,
    TransitionError,
};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::LoopConfig;
use crate::error::{LoopError, Result};
use crate::services::SessionServices;

/// What the loop reports to the front end.
#[derive(Debug, Clone)]
pub enum SessionUpdate {
    /// The machine accepted an event.
    StateChanged {
        event: &'static str,
        state: SessionState,
        context: Box<SessionContext>,
    },
    /// The latest answer is on screen.
    Rendered { turn: Option<Turn> },
    /// A user event was not accepted.
    Rejected { event: &'static str, reason: String },
}

/// Sending side of a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    events: mpsc::Sender<SessionEvent>,
    cancel_token: CancellationToken,
}

impl SessionHandle {
    pub async fn send(&self, event: SessionEvent) -> Result<()> {
        if self.cancel_token.is_cancelled() {
            return Err(LoopError::Closed);
        }
        self.events.send(event).await.map_err(|_| LoopError::Closed)
    }

    /// Stop the loop and abort the effects still running.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel_token.is_cancelled() || self.events.is_closed()
    }
}

/// Owns the state machine and every task started on its behalf.
pub struct SessionRuntime {
    machine: StateMachine,
    services: SessionServices,
    config: LoopConfig,
    events_tx: mpsc::Sender<SessionEvent>,
    events_rx: mpsc::Receiver<SessionEvent>,
    updates_tx: mpsc::Sender<SessionUpdate>,
    cancel_token: CancellationToken,
    tasks: JoinSet<()>,
    archive_tx: mpsc::UnboundedSender<Effect>,
    archive_rx: Option<mpsc::UnboundedReceiver<Effect>>,
    saved_settings: SettingsSnapshot,
}

impl SessionRuntime {
    pub fn new(
        context: SessionContext,
        services: SessionServices,
        config: LoopConfig,
    ) -> (Self, SessionHandle, mpsc::Receiver<SessionUpdate>) {
        let (events_tx, events_rx) = mpsc::channel(config.channel_capacity);
        let (updates_tx, updates_rx) = mpsc::channel(config.channel_capacity);
        let (archive_tx, archive_rx) = mpsc::unbounded_channel();
        let cancel_token = CancellationToken::new();

        let handle = SessionHandle {
            events: events_tx.clone(),
            cancel_token: cancel_token.clone(),
        };
        let runtime = Self {
            saved_settings: context.settings(),
            machine: StateMachine::new(context),
            services,
            config,
            events_tx,
            events_rx,
            updates_tx,
            cancel_token,
            tasks: JoinSet::new(),
            archive_tx,
            archive_rx: Some(archive_rx),
        };
        (runtime, handle, updates_rx)
    }

    /// Build a runtime whose context starts from the saved settings.
    pub async fn load(
        user: Option<UserRef>,
        services: SessionServices,
        config: LoopConfig,
    ) -> Result<(Self, SessionHandle, mpsc::Receiver<SessionUpdate>)> {
        let settings = services.settings.load().await?.unwrap_or_default();
        let context = SessionContext::with_settings(settings).with_user(user);
        Ok(Self::new(context, services, config))
    }

    /// Run until shutdown and return the final context.
    pub async fn run(mut self) -> Result<SessionContext> {
        let cancel_token = self.cancel_token.clone();

        if let Some(queue) = self.archive_rx.take() {
            self.tasks.spawn(run_archive_queue(
                queue,
                self.services.clone(),
                self.events_tx.clone(),
            ));
        }

        let effects = self.machine.start();
        log::info!("Session started in {}", self.machine.state());
        self.publish_state("START").await;
        for effect in effects {
            self.dispatch(effect).await;
        }

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    log::debug!("Session loop cancelled");
                    break;
                }
                event = self.events_rx.recv() => match event {
                    Some(event) => self.handle(event).await,
                    None => break,
                },
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            log::error!("Effect task panicked: {}", e);
                        }
                    }
                }
            }
        }

        self.tasks.shutdown().await;
        if let Err(e) = self.services.recognizer.stop().await {
            log::warn!("Failed to stop recognition on shutdown: {}", e);
        }
        log::info!("Session stopped in {}", self.machine.state());
        Ok(self.machine.context().clone())
    }

    async fn handle(&mut self, event: SessionEvent) {
        let name = event.name();
        let is_user_event = event.is_user_event();
        let settings_loaded = matches!(event, SessionEvent::SettingsLoaded { .. });

        match self.machine.try_handle_event(event) {
            Ok(effects) => {
                self.publish_state(name).await;
                if settings_loaded {
                    self.saved_settings = self.machine.context().settings();
                } else {
                    self.persist_settings().await;
                }
                for effect in effects {
                    self.dispatch(effect).await;
                }
            }
            Err(TransitionError::InvalidTransition { from, event }) => {
                log::debug!("Ignoring {} in {}", event, from);
                if is_user_event {
                    self.publish(SessionUpdate::Rejected {
                        event,
                        reason: format!("not available while {}", from.description()),
                    })
                    .await;
                }
            }
            Err(e) => {
                log::warn!("Rejected {}: {}", name, e);
                self.publish(SessionUpdate::Rejected {
                    event: name,
                    reason: e.to_string(),
                })
                .await;
            }
        }
    }

    async fn persist_settings(&mut self) {
        if !self.config.save_settings {
            return;
        }
        let current = self.machine.context().settings();
        if current == self.saved_settings {
            return;
        }
        match self.services.settings.save(&current).await {
            Ok(()) => self.saved_settings = current,
            Err(e) => log::warn!("Failed to save settings: {}", e),
        }
    }

    async fn dispatch(&mut self, effect: Effect) {
        log::debug!("Running effect {}", effect.name());
        match effect {
            Effect::Rendered { turn } => self.publish(SessionUpdate::Rendered { turn }).await,
            effect if effect.touches_archive() => {
                if self.archive_tx.send(effect).is_err() {
                    log::warn!("Archive queue is closed, dropping effect");
                }
            }
            effect => {
                let services = self.services.clone();
                let events = self.events_tx.clone();
                let pause_override = self.config.pause_override;
                self.tasks
                    .spawn(run_effect(effect, services, events, pause_override));
            }
        }
    }

    async fn publish_state(&self, event: &'static str) {
        self.publish(SessionUpdate::StateChanged {
            event,
            state: self.machine.state().clone(),
            context: Box::new(self.machine.context().clone()),
        })
        .await;
    }

    async fn publish(&self, update: SessionUpdate) {
        // Nobody listening is fine
        let _ = self.updates_tx.send(update).await;
    }
}

fn failed(service: ServiceKind, error: impl Display) -> SessionEvent {
    log::warn!("{} failed: {}", service, error);
    SessionEvent::failed(service, error.to_string())
}

async fn send(events: &mpsc::Sender<SessionEvent>, event: SessionEvent) -> bool {
    events.send(event).await.is_ok()
}

/// Run archive effects one at a time, in the order they were dispatched, so a
/// store and a later drop of the same archive can never finish out of order.
async fn run_archive_queue(
    mut queue: mpsc::UnboundedReceiver<Effect>,
    services: SessionServices,
    events: mpsc::Sender<SessionEvent>,
) {
    while let Some(effect) = queue.recv().await {
        run_effect(effect, services.clone(), events.clone(), None).await;
    }
}

/// Run one effect and report its outcome as an event.
async fn run_effect(
    effect: Effect,
    services: SessionServices,
    events: mpsc::Sender<SessionEvent>,
    pause_override: Option<Duration>,
) {
    let outcome = match effect {
        Effect::LoadSettings => match services.settings.load().await {
            Ok(settings) => SessionEvent::SettingsLoaded { settings },
            Err(e) => {
                log::warn!("Failed to load settings, keeping current ones: {}", e);
                SessionEvent::SettingsLoaded { settings: None }
            }
        },
        Effect::LoadSessions { ticket, user } => {
            match services.archive.load(user.as_ref()).await {
                Ok(sessions) => SessionEvent::SessionsLoaded { ticket, sessions },
                Err(e) => {
                    log::warn!("Archive load {} failed: {}", ticket, e);
                    SessionEvent::load_failed(ticket, e)
                }
            }
        }
        Effect::StartListening { lang_code } => {
            let (transcripts_tx, mut transcripts_rx) = mpsc::channel(8);
            if let Err(e) = services.recognizer.start(&lang_code, transcripts_tx).await {
                send(&events, failed(ServiceKind::StartListening, e)).await;
                return;
            }
            if !send(&events, SessionEvent::ListeningStarted).await {
                return;
            }
            // Ends when the recognizer drops its sender on stop
            while let Some(transcript) = transcripts_rx.recv().await {
                if !send(&events, SessionEvent::Heard { transcript }).await {
                    break;
                }
            }
            return;
        }
        Effect::StopListening => match services.recognizer.stop().await {
            Ok(()) => SessionEvent::ListeningStopped,
            Err(e) => failed(ServiceKind::StopListening, e),
        },
        Effect::SendChatRequest { ticket, request } => {
            match services.generator.generate(&request).await {
                Ok(result) => SessionEvent::ChatResponse { ticket, result },
                Err(e) => {
                    log::warn!("Chat request {} failed: {}", ticket, e);
                    SessionEvent::chat_failed(ticket, e)
                }
            }
        }
        Effect::Pause { duration } => {
            tokio::time::sleep(pause_override.unwrap_or(duration)).await;
            SessionEvent::PauseElapsed
        }
        Effect::SpeakText { text, lang_code } => {
            match services.synthesizer.speak(&text, &lang_code).await {
                Ok(()) => SessionEvent::Spoken,
                Err(e) => failed(ServiceKind::SpeakText, e),
            }
        }
        Effect::LoadTranslation { text, lang_code } => {
            match services.translator.translate(&text, &lang_code).await {
                Ok(result) => SessionEvent::Translated { result },
                Err(e) => failed(ServiceKind::LoadTranslation, e),
            }
        }
        Effect::StoreSessions { user, sessions } => {
            match services.archive.store(user.as_ref(), &sessions).await {
                Ok(sessions) => SessionEvent::SessionsStored { sessions },
                Err(e) => failed(ServiceKind::StoreSessions, e),
            }
        }
        Effect::DropSessions { user } => match services.archive.drop_all(user.as_ref()).await {
            Ok(sessions) => SessionEvent::SessionsDropped { sessions },
            Err(e) => failed(ServiceKind::DropSessions, e),
        },
        Effect::Rendered { .. } => return,
    };

    send(&events, outcome).await;
}

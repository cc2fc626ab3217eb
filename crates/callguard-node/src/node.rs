//! Component wiring.
//!
//! The [`Node`] builds the whole screening graph from a storage engine,
//! the application config and the host-provided collaborators
//! (directory, message transport, spam feed). Construction is explicit:
//! every component receives its dependencies through its constructor.

use std::sync::Arc;
use std::time::Duration;

use callguard_phone::PhoneNumberNormalizer;
use callguard_storage::call_log::CallLogStore;
use callguard_storage::lists::ListStore;
use callguard_storage::message_log::MessageLogStore;
use callguard_storage::settings::SettingsStore;
use callguard_storage::spam::SpamStore;
use callguard_storage::StorageEngine;
use callguard_types::config::AppConfig;
use callguard_types::repository::{
    CallLogRepository, Directory, ListRepository, MessageLogRepository, MessageTransport,
    PolicySource, SpamFeed, SpamRepository,
};
use callguard_types::Result;
use tokio::task::JoinHandle;

use crate::actions::UserActions;
use crate::decision::DecisionEngine;
use crate::dispatcher::MessageDispatcher;
use crate::eligibility::MessageEligibility;
use crate::maintenance::MaintenanceTask;
use crate::recorder::EventRecorder;
use crate::scheduler::JobScheduler;
use crate::screening::CallScreener;
use crate::spam_sync::{SpamSync, SpamSyncScheduler, SyncPolicy};

/// Host-provided implementations of the external seams.
#[derive(Clone)]
pub struct Collaborators {
    pub directory: Arc<dyn Directory>,
    pub transport: Arc<dyn MessageTransport>,
    /// Without a feed the spam database is only filled by imports.
    pub feed: Option<Arc<dyn SpamFeed>>,
}

/// Handles to the background work started by [`Node::start_background`].
pub struct BackgroundTasks {
    pub sync: Option<SpamSyncScheduler>,
    pub maintenance: JoinHandle<()>,
}

impl BackgroundTasks {
    /// Cancels the periodic sync and stops maintenance.
    pub fn stop(self) {
        if let Some(sync) = &self.sync {
            sync.cancel();
        }
        self.maintenance.abort();
    }
}

/// The assembled screening runtime.
pub struct Node {
    config: AppConfig,
    storage: Arc<StorageEngine>,
    normalizer: Arc<PhoneNumberNormalizer>,
    lists: Arc<ListStore>,
    spam: Arc<SpamStore>,
    calls: Arc<CallLogStore>,
    messages: Arc<MessageLogStore>,
    settings: Arc<SettingsStore>,
    engine: Arc<DecisionEngine>,
    recorder: Arc<EventRecorder>,
    eligibility: Arc<MessageEligibility>,
    dispatcher: Arc<MessageDispatcher>,
    screener: CallScreener,
    actions: UserActions,
    sync: Option<Arc<SpamSync>>,
}

impl Node {
    /// Wires every component.
    ///
    /// # Errors
    ///
    /// [`CallguardError::ConfigError`](callguard_types::CallguardError::ConfigError)
    /// for an invalid `config`, or a storage error opening a tree.
    pub fn new(
        storage: Arc<StorageEngine>,
        config: AppConfig,
        collaborators: Collaborators,
    ) -> Result<Self> {
        config.validate()?;

        let normalizer = Arc::new(PhoneNumberNormalizer::new(&config.default_region));
        let lists = Arc::new(storage.lists()?);
        let spam = Arc::new(storage.spam()?);
        let calls = Arc::new(storage.call_log()?);
        let messages = Arc::new(storage.message_log()?);
        let settings = storage.settings();

        let list_repo: Arc<dyn ListRepository> = lists.clone();
        let spam_repo: Arc<dyn SpamRepository> = spam.clone();
        let call_repo: Arc<dyn CallLogRepository> = calls.clone();
        let message_repo: Arc<dyn MessageLogRepository> = messages.clone();
        let policy: Arc<dyn PolicySource> = settings.clone();

        let engine = Arc::new(DecisionEngine::new(
            Arc::clone(&normalizer),
            Arc::clone(&list_repo),
            Arc::clone(&spam_repo),
            Arc::clone(&collaborators.directory),
            Arc::clone(&policy),
        ));
        let recorder = Arc::new(EventRecorder::new(
            Arc::clone(&normalizer),
            Arc::clone(&collaborators.directory),
            call_repo,
        ));
        let eligibility = Arc::new(MessageEligibility::new(
            Arc::clone(&normalizer),
            Arc::clone(&message_repo),
            Arc::clone(&policy),
        ));
        let dispatcher = Arc::new(MessageDispatcher::new(
            Arc::clone(&normalizer),
            message_repo,
            collaborators.transport,
            policy,
            Duration::from_millis(config.dispatch_timeout_ms),
        ));
        let screener = CallScreener::new(
            Arc::clone(&normalizer),
            Arc::clone(&engine),
            Arc::clone(&recorder),
            Arc::clone(&eligibility),
            Arc::clone(&dispatcher),
            Duration::from_millis(config.decision_timeout_ms),
        );
        let actions = UserActions::new(Arc::clone(&normalizer), list_repo, Arc::clone(&dispatcher));
        let sync = collaborators
            .feed
            .map(|feed| Arc::new(SpamSync::new(feed, spam_repo, SyncPolicy::from(&config))));

        tracing::debug!(region = %config.default_region, spam_feed = sync.is_some(), "node wired");

        Ok(Self {
            config,
            storage,
            normalizer,
            lists,
            spam,
            calls,
            messages,
            settings,
            engine,
            recorder,
            eligibility,
            dispatcher,
            screener,
            actions,
            sync,
        })
    }

    /// Schedules the periodic spam sync (when a feed is configured) and
    /// spawns the maintenance loop. Must be called inside a tokio
    /// runtime.
    pub fn start_background(&self, scheduler: Arc<dyn JobScheduler>) -> BackgroundTasks {
        let sync = self.sync.as_ref().map(|sync| {
            let sync_scheduler = SpamSyncScheduler::new(Arc::clone(sync), scheduler);
            sync_scheduler.schedule();
            sync_scheduler
        });
        let maintenance = tokio::spawn(
            MaintenanceTask::new(Arc::clone(&self.storage), self.config.clone()).run(),
        );
        BackgroundTasks { sync, maintenance }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<StorageEngine> {
        &self.storage
    }

    pub fn normalizer(&self) -> &Arc<PhoneNumberNormalizer> {
        &self.normalizer
    }

    pub fn lists(&self) -> &Arc<ListStore> {
        &self.lists
    }

    pub fn spam(&self) -> &Arc<SpamStore> {
        &self.spam
    }

    pub fn calls(&self) -> &Arc<CallLogStore> {
        &self.calls
    }

    pub fn messages(&self) -> &Arc<MessageLogStore> {
        &self.messages
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    pub fn engine(&self) -> &Arc<DecisionEngine> {
        &self.engine
    }

    pub fn recorder(&self) -> &Arc<EventRecorder> {
        &self.recorder
    }

    pub fn eligibility(&self) -> &Arc<MessageEligibility> {
        &self.eligibility
    }

    pub fn dispatcher(&self) -> &Arc<MessageDispatcher> {
        &self.dispatcher
    }

    pub fn screener(&self) -> &CallScreener {
        &self.screener
    }

    pub fn actions(&self) -> &UserActions {
        &self.actions
    }

    /// The spam sync, if a feed was configured.
    pub fn spam_sync(&self) -> Option<&Arc<SpamSync>> {
        self.sync.as_ref()
    }
}

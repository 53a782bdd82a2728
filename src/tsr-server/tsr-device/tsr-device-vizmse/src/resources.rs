// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Element cache and loading of remote elements.
//!
//! Every element is created at most once per rundown session: the cache is
//! keyed by [`ElementTarget`] (element and channel) and owned by the device
//! task, so two requests for the same element can never interleave.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use tsr_core::device::controller::{retry_with, FixedDelay};
use tsr_core::types::vizmse::{TemplateRef, VizMseExpectedItem};
use tsr_core::{DeviceError, DeviceEventEmitter, DeviceFuture, DeviceResult};

use crate::command::VizMseAction;
use crate::peer::{classify_remote_error, ElementRef, LoadState, Mse, MseRundown, RemoteElement, RundownInfo};
use crate::state::{ElementKey, ElementTarget};

#[derive(Debug, Clone, PartialEq)]
pub struct ManagerOptions {
    /// Create and load every expected element ahead of use.
    pub preload_all_elements: bool,
    /// Total tries of a remote call failing with a transient error.
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    /// Load polling only runs after this long without a command.
    pub safe_preload_window: Duration,
    /// Pause after creating an element on demand.
    pub late_prepare_settle: Duration,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            preload_all_elements: false,
            retry_attempts: 5,
            retry_delay: Duration::from_millis(300),
            safe_preload_window: Duration::from_millis(2_000),
            late_prepare_settle: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CachedElement {
    /// Instance name of the element in the rundown.
    pub instance: String,
    pub element: RemoteElement,
    /// Last polled load state, `None` until polled.
    pub load_state: Option<LoadState>,
}

#[derive(Debug, Clone, Copy)]
struct ExpectedElement {
    no_auto_preloading: bool,
}

pub struct ElementManager {
    mse: Arc<dyn Mse>,
    rundown: Option<Arc<dyn MseRundown>>,
    options: ManagerOptions,
    retry: FixedDelay,
    events: Arc<DeviceEventEmitter>,
    cache: HashMap<ElementTarget, CachedElement>,
    expected_items: Vec<VizMseExpectedItem>,
    expected: BTreeMap<ElementTarget, ExpectedElement>,
    active: bool,
    last_command_sent: Option<Instant>,
    not_loaded_count: usize,
    loading_count: usize,
}

impl ElementManager {
    pub fn new(mse: Arc<dyn Mse>, options: ManagerOptions, events: Arc<DeviceEventEmitter>) -> Self {
        let retry = FixedDelay::new(options.retry_attempts.max(1), options.retry_delay);
        Self {
            mse,
            rundown: None,
            options,
            retry,
            events,
            cache: HashMap::new(),
            expected_items: Vec::new(),
            expected: BTreeMap::new(),
            active: false,
            last_command_sent: None,
            not_loaded_count: 0,
            loading_count: 0,
        }
    }

    pub fn host(&self) -> &str {
        self.mse.host()
    }

    pub fn is_initialized(&self) -> bool {
        self.rundown.is_some()
    }

    pub fn is_connected(&self) -> bool {
        self.mse.is_connected()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Elements not loaded yet, and elements currently loading.
    pub fn load_counts(&self) -> (usize, usize) {
        (self.not_loaded_count, self.loading_count)
    }

    pub fn cached(&self, target: &ElementTarget) -> Option<&CachedElement> {
        self.cache.get(target)
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Find the rundown for `info`, creating it when the sequencer has none.
    pub async fn initialize_rundown(&mut self, info: RundownInfo) -> DeviceResult<()> {
        self.mse.ping().await.map_err(classify_remote_error)?;

        let existing = self
            .mse
            .get_rundowns()
            .await
            .map_err(classify_remote_error)?
            .into_iter()
            .find(|rundown| rundown.info() == &info);
        let rundown = match existing {
            Some(rundown) => {
                debug!("Reusing rundown {:?} on {}", info, self.mse.host());
                rundown
            }
            None => {
                info!("Creating rundown {:?} on {}", info, self.mse.host());
                self.mse.create_rundown(&info).await.map_err(classify_remote_error)?
            }
        };
        self.rundown = Some(rundown);
        self.update_expected_items().await;
        Ok(())
    }

    pub async fn terminate(&mut self) -> DeviceResult<()> {
        self.rundown = None;
        self.active = false;
        self.mse.close().await
    }

    pub async fn activate(&mut self) -> DeviceResult<()> {
        let rundown = self.rundown()?;
        self.touch();
        rundown.activate().await.map_err(classify_remote_error)?;
        self.touch();
        self.trigger_load_all().await?;
        self.touch();
        self.active = true;
        Ok(())
    }

    /// Deactivate the rundown. Every cached element is forgotten.
    pub async fn deactivate(&mut self) -> DeviceResult<()> {
        let rundown = self.rundown()?;
        self.touch();
        rundown.deactivate().await.map_err(classify_remote_error)?;
        self.touch();
        self.cache.clear();
        self.active = false;
        Ok(())
    }

    pub async fn set_expected_items(&mut self, items: Vec<VizMseExpectedItem>) {
        if self.options.preload_all_elements {
            self.expected_items = items;
        }
        self.update_expected_items().await;
    }

    async fn update_expected_items(&mut self) {
        if !self.options.preload_all_elements || self.rundown.is_none() {
            return;
        }
        debug!("Updating {} expected elements", self.expected_items.len());

        let mut expected = BTreeMap::new();
        for item in self.expected_items.clone() {
            let target = expected_target(&item);
            if let Err(err) = self.ensure_prepared(&target, true).await {
                self.error(&format!("preloading \"{}\"", target), &err);
            }
            expected.insert(
                target,
                ExpectedElement {
                    no_auto_preloading: item.no_auto_preloading,
                },
            );
        }
        self.expected = expected;
    }

    /// Reference of the element behind `target`, creating it if needed.
    ///
    /// Outside of an explicit prepare, a missing element is created late:
    /// that is reported as a warning and followed by a short settle pause.
    pub async fn ensure_prepared(&mut self, target: &ElementTarget, from_prepare: bool) -> DeviceResult<ElementRef> {
        if let Some(cached) = self.cache.get(target) {
            return Ok(cached.element.reference());
        }
        if from_prepare {
            self.debug(&format!("preparing new \"{}\"", target));
        } else {
            self.warning(&format!("Late preparation of element \"{}\"", target));
        }

        let element = self.prepare_new(target).await?;
        let reference = element.reference();
        self.cache.insert(
            target.clone(),
            CachedElement {
                instance: target.instance_name(),
                element,
                load_state: None,
            },
        );

        if !from_prepare {
            tokio::time::sleep(self.options.late_prepare_settle).await;
        }
        Ok(reference)
    }

    async fn prepare_new(&mut self, target: &ElementTarget) -> DeviceResult<RemoteElement> {
        let rundown = self.rundown()?;
        let instance = target.instance_name();
        let channel = target.channel_name.as_deref();

        debug!("Creating element {} on channel {:?}", target.key, channel);
        self.touch();
        let created = match &target.key {
            ElementKey::Internal {
                template_name,
                template_data,
            } => {
                rundown
                    .create_internal_element(template_name, &instance, template_data, channel)
                    .await
            }
            ElementKey::Pilot { vcp_id } => rundown.create_pilot_element(*vcp_id, channel).await,
        }
        .map_err(classify_remote_error);
        self.touch();

        match created {
            Ok(element) => Ok(element),
            Err(err) if err.is_conflict() => {
                self.debug(&format!("\"{}\" already exists, fetching it", instance));
                let reference = match &target.key {
                    ElementKey::Internal { .. } => ElementRef::Name(instance),
                    ElementKey::Pilot { vcp_id } => ElementRef::VcpId(*vcp_id),
                };
                rundown.get_element(&reference).await.map_err(classify_remote_error)
            }
            Err(err) => Err(err),
        }
    }

    /// Run one engine command.
    pub async fn execute(&mut self, action: &VizMseAction) -> DeviceResult<()> {
        match action {
            VizMseAction::Prepare(target) => {
                self.rundown()?;
                self.debug(&format!("prepare \"{}\"", target));
                self.touch();
                self.ensure_prepared(target, true).await?;
                self.touch();
                Ok(())
            }
            VizMseAction::LoadAllElements => {
                self.touch();
                self.trigger_load_all().await?;
                self.touch();
                Ok(())
            }
            VizMseAction::Cue(target)
            | VizMseAction::Take(target)
            | VizMseAction::TakeOut(target)
            | VizMseAction::Continue(target)
            | VizMseAction::ContinueReverse(target) => {
                let rundown = self.rundown()?;
                let reference = self.ensure_prepared(target, false).await?;
                self.debug(&format!("{} \"{}\"", action.name(), reference));

                let rundown = rundown.as_ref();
                let element = &reference;
                self.touch();
                let result = retry_with(&self.retry, action.name(), move || async move {
                    element_call(rundown, action, element)
                        .await
                        .map_err(classify_remote_error)
                })
                .await;
                self.touch();
                result
            }
        }
    }

    /// Refresh the load state of the expected elements.
    ///
    /// Elements marked as not auto-preloaded and elements not created yet
    /// are left alone. With `force`, earlier results are discarded first.
    async fn update_load_status(&mut self, force: bool) -> DeviceResult<()> {
        let rundown = self.rundown()?;
        if force {
            for cached in self.cache.values_mut() {
                cached.load_state = None;
            }
        }

        let targets: Vec<ElementTarget> = self
            .expected
            .iter()
            .filter(|(target, expected)| !expected.no_auto_preloading && self.cache.contains_key(target))
            .map(|(target, _)| target.clone())
            .collect();

        for target in targets {
            let Some(cached) = self.cache.get(&target) else {
                continue;
            };
            if cached.load_state == Some(LoadState::Loaded) {
                continue;
            }
            let reference = cached.element.reference();
            let element = rundown.get_element(&reference).await.map_err(classify_remote_error)?;
            if let Some(cached) = self.cache.get_mut(&target) {
                cached.load_state = Some(element.load_state());
                cached.element = element;
            }
        }
        Ok(())
    }

    /// Start loading every expected pilot element that is not loading yet.
    pub async fn trigger_load_all(&mut self) -> DeviceResult<()> {
        let rundown = self.rundown()?;
        self.update_load_status(true).await?;

        let polled: Vec<(ElementRef, LoadState)> = self
            .cache
            .values()
            .filter(|cached| cached.element.is_pilot())
            .filter_map(|cached| cached.load_state.map(|state| (cached.element.reference(), state)))
            .collect();

        for (reference, state) in polled {
            match state {
                LoadState::Loaded => self.debug(&format!("Element \"{}\" is loaded", reference)),
                LoadState::Loading => self.debug(&format!("Element \"{}\" is loading", reference)),
                LoadState::NotLoaded => {
                    self.debug(&format!("Element \"{}\" is not loaded, initializing", reference));
                    rundown.initialize(&reference).await.map_err(classify_remote_error)?;
                }
            }
        }
        Ok(())
    }

    /// Expected, auto-preloaded elements and their cache entries.
    fn preloaded(&self) -> impl Iterator<Item = (&ElementTarget, Option<&CachedElement>)> {
        self.expected
            .iter()
            .filter(|(_, expected)| !expected.no_auto_preloading)
            .map(move |(target, _)| (target, self.cache.get(target)))
    }

    /// One round of load monitoring. Returns true when the load counts
    /// changed, which changes the device status.
    ///
    /// Once nothing has been sent for the safe preload window, expected
    /// elements are created if missing and not-loaded ones start loading.
    pub async fn monitor(&mut self) -> bool {
        let idle = self
            .last_command_sent
            .map_or(true, |sent| sent.elapsed() > self.options.safe_preload_window);

        let counts = if self.rundown.is_some() && self.active && self.options.preload_all_elements && idle {
            match self.load_expected().await {
                Ok(counts) => counts,
                Err(err) => {
                    self.error("monitoring loaded elements", &err);
                    return false;
                }
            }
        } else {
            (0, 0)
        };

        let changed = counts != (self.not_loaded_count, self.loading_count);
        (self.not_loaded_count, self.loading_count) = counts;
        changed
    }

    /// Poll the expected elements and initialize the ones not loaded yet.
    /// Returns the not-loaded and loading counts of the expected elements.
    async fn load_expected(&mut self) -> DeviceResult<(usize, usize)> {
        let rundown = self.rundown()?;

        let missing: Vec<ElementTarget> = self
            .preloaded()
            .filter(|(_, cached)| cached.is_none())
            .map(|(target, _)| target.clone())
            .collect();
        for target in missing {
            self.ensure_prepared(&target, true).await?;
        }
        self.update_load_status(false).await?;

        let not_loaded: Vec<ElementTarget> = self
            .preloaded()
            .filter(|(_, cached)| cached.and_then(|c| c.load_state) == Some(LoadState::NotLoaded))
            .map(|(target, _)| target.clone())
            .collect();
        for target in &not_loaded {
            let Some(reference) = self.cache.get(target).map(|c| c.element.reference()) else {
                continue;
            };
            self.debug(&format!("Element \"{}\" is not loaded, initializing", reference));
            rundown.initialize(&reference).await.map_err(classify_remote_error)?;
            if let Some(cached) = self.cache.get_mut(target) {
                cached.load_state = Some(LoadState::Loading);
            }
        }

        Ok(self
            .preloaded()
            .fold((0, 0), |(not_loaded, loading), (_, cached)| {
                match cached.and_then(|c| c.load_state) {
                    Some(LoadState::NotLoaded) => (not_loaded + 1, loading),
                    Some(LoadState::Loading) => (not_loaded, loading + 1),
                    _ => (not_loaded, loading),
                }
            }))
    }

    fn rundown(&self) -> DeviceResult<Arc<dyn MseRundown>> {
        self.rundown
            .clone()
            .ok_or_else(|| DeviceError::config("rundown not initialized"))
    }

    fn touch(&mut self) {
        self.last_command_sent = Some(Instant::now());
    }

    fn debug(&self, message: &str) {
        debug!("{}: {}", self.events.device_id(), message);
        self.events.notify_debug(message);
    }

    fn warning(&self, message: &str) {
        warn!("{}: {}", self.events.device_id(), message);
        self.events.notify_warning(message);
    }

    fn error(&self, context: &str, err: &DeviceError) {
        error!("{}: {}: {}", self.events.device_id(), context, err);
        self.events.notify_error(context, err);
    }
}

fn expected_target(item: &VizMseExpectedItem) -> ElementTarget {
    let key = match &item.template_name {
        TemplateRef::VcpId(vcp_id) => ElementKey::Pilot { vcp_id: *vcp_id },
        TemplateRef::Name(name) => ElementKey::Internal {
            template_name: name.clone(),
            template_data: item.template_data.clone(),
        },
    };
    ElementTarget {
        key,
        channel_name: item.channel_name.clone(),
    }
}

fn element_call<'a>(
    rundown: &'a dyn MseRundown,
    action: &VizMseAction,
    element: &'a ElementRef,
) -> DeviceFuture<'a, ()> {
    match action {
        VizMseAction::Cue(_) => rundown.cue(element),
        VizMseAction::Take(_) => rundown.take(element),
        VizMseAction::TakeOut(_) => rundown.out(element),
        VizMseAction::Continue(_) => rundown.continue_element(element),
        VizMseAction::ContinueReverse(_) => rundown.continue_reverse(element),
        other => {
            let err = DeviceError::unsupported(format!("element call {}", other.name()));
            Box::pin(async move { Err(err) })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{MseCall, SimulatedMse};
    use tsr_core::device::controller::RecordingListener;

    fn rundown_info() -> RundownInfo {
        RundownInfo {
            show: "show0".into(),
            profile: "sofie".into(),
            playlist: None,
        }
    }

    fn internal(name: &str) -> ElementTarget {
        ElementTarget {
            key: ElementKey::Internal {
                template_name: name.into(),
                template_data: vec!["a".into()],
            },
            channel_name: Some("FULL1".into()),
        }
    }

    async fn manager(sim: &SimulatedMse, preload: bool) -> (ElementManager, Arc<RecordingListener>) {
        let events = Arc::new(DeviceEventEmitter::new("viz0"));
        let listener = RecordingListener::new();
        events.register(listener.clone());
        let options = ManagerOptions {
            preload_all_elements: preload,
            ..ManagerOptions::default()
        };
        let mut manager = ElementManager::new(Arc::new(sim.clone()), options, events);
        manager.initialize_rundown(rundown_info()).await.unwrap();
        (manager, listener)
    }

    #[tokio::test(start_paused = true)]
    async fn test_rundown_is_reused_when_present() {
        let sim = SimulatedMse::new("mse0");
        sim.add_rundown(rundown_info());
        let (manager, _) = manager(&sim, false).await;

        assert!(manager.is_initialized());
        assert_eq!(sim.count("create_rundown"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rundown_is_created_when_missing() {
        let sim = SimulatedMse::new("mse0");
        sim.add_rundown(RundownInfo {
            playlist: Some("other".into()),
            ..rundown_info()
        });
        let (manager, _) = manager(&sim, false).await;

        assert!(manager.is_initialized());
        assert_eq!(sim.count("create_rundown"), 1);
        assert_eq!(sim.calls()[0], MseCall::Ping);
    }

    #[tokio::test(start_paused = true)]
    async fn test_identical_targets_create_once() {
        let sim = SimulatedMse::new("mse0");
        let (mut manager, _) = manager(&sim, false).await;
        let target = internal("lower");

        let first = manager.ensure_prepared(&target, true).await.unwrap();
        let second = manager.ensure_prepared(&target.clone(), true).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(sim.count("create_internal"), 1);
        assert_eq!(manager.cache_len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_template_on_two_channels_creates_two_elements() {
        let sim = SimulatedMse::new("mse0");
        let (mut manager, _) = manager(&sim, false).await;
        let full = internal("lower");
        let wall = ElementTarget {
            channel_name: Some("WALL".into()),
            ..full.clone()
        };

        let on_full = manager.ensure_prepared(&full, true).await.unwrap();
        let on_wall = manager.ensure_prepared(&wall, true).await.unwrap();

        assert_ne!(on_full, on_wall);
        assert_eq!(sim.count("create_internal"), 2);
        assert_eq!(manager.cache_len(), 2);

        manager.execute(&VizMseAction::Take(wall)).await.unwrap();
        assert_eq!(sim.calls().last(), Some(&MseCall::Take(on_wall)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_existing_element_is_fetched() {
        let sim = SimulatedMse::new("mse0");
        let (mut manager, listener) = manager(&sim, false).await;
        let target = internal("lower");
        sim.put_element(RemoteElement::Internal {
            name: target.instance_name(),
        });

        let reference = manager.ensure_prepared(&target, true).await.unwrap();

        assert_eq!(reference, ElementRef::Name(target.instance_name()));
        assert_eq!(sim.count("get_element"), 1);
        assert!(listener.events().iter().all(|e| !matches!(
            e,
            tsr_core::device::controller::RecordedEvent::Error(..)
        )));
        assert!(manager.cached(&target).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_take_without_prepare_warns() {
        let sim = SimulatedMse::new("mse0");
        let (mut manager, listener) = manager(&sim, false).await;

        let started = Instant::now();
        manager.execute(&VizMseAction::Take(internal("lower"))).await.unwrap();

        assert_eq!(listener.warnings().len(), 1);
        assert!(listener.warnings()[0].starts_with("Late preparation of element"));
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(sim.count("take"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prepared_take_does_not_warn() {
        let sim = SimulatedMse::new("mse0");
        let (mut manager, listener) = manager(&sim, false).await;
        let target = internal("lower");

        manager.execute(&VizMseAction::Prepare(target.clone())).await.unwrap();
        manager.execute(&VizMseAction::Take(target)).await.unwrap();

        assert!(listener.warnings().is_empty());
        let calls = sim.calls();
        assert!(matches!(calls.last(), Some(MseCall::Take(ElementRef::Name(_)))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_are_retried() {
        let sim = SimulatedMse::new("mse0");
        let (mut manager, _) = manager(&sim, false).await;
        let target = internal("lower");
        manager.ensure_prepared(&target, true).await.unwrap();

        sim.fail_next("take", DeviceError::remote("PepTalk inexistent error"));
        sim.fail_next("take", DeviceError::remote("PepTalk inexistent error"));

        let started = Instant::now();
        manager.execute(&VizMseAction::Take(target)).await.unwrap();

        assert_eq!(sim.count("take"), 3);
        assert_eq!(started.elapsed(), Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_abort() {
        let sim = SimulatedMse::new("mse0");
        let (mut manager, _) = manager(&sim, false).await;
        let target = internal("lower");
        manager.ensure_prepared(&target, true).await.unwrap();

        sim.fail_next("cue", DeviceError::remote("template is broken"));
        let result = manager.execute(&VizMseAction::Cue(target)).await;

        assert_eq!(result, Err(DeviceError::remote("template is broken")));
        assert_eq!(sim.count("cue"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activate_loads_expected_pilots() {
        let sim = SimulatedMse::new("mse0");
        let (mut manager, _) = manager(&sim, true).await;
        manager
            .set_expected_items(vec![
                VizMseExpectedItem {
                    template_name: TemplateRef::VcpId(1234),
                    template_data: vec![],
                    channel_name: None,
                    no_auto_preloading: false,
                },
                VizMseExpectedItem {
                    template_name: TemplateRef::VcpId(99),
                    template_data: vec![],
                    channel_name: None,
                    no_auto_preloading: true,
                },
            ])
            .await;
        assert_eq!(sim.count("create_pilot"), 2);

        manager.activate().await.unwrap();

        assert!(manager.is_active());
        assert_eq!(
            sim.calls()
                .into_iter()
                .filter(|c| matches!(c, MseCall::Initialize(_)))
                .collect::<Vec<_>>(),
            vec![MseCall::Initialize(ElementRef::VcpId(1234))]
        );

        // Too soon after the last command.
        assert!(!manager.monitor().await);
        assert_eq!(manager.load_counts(), (0, 0));

        tokio::time::advance(Duration::from_millis(2_500)).await;
        assert!(manager.monitor().await);
        assert_eq!(manager.load_counts(), (0, 1));
    }

    fn pilot(vcp_id: i64, no_auto_preloading: bool) -> VizMseExpectedItem {
        VizMseExpectedItem {
            template_name: TemplateRef::VcpId(vcp_id),
            template_data: vec![],
            channel_name: None,
            no_auto_preloading,
        }
    }

    fn initialized(sim: &SimulatedMse, vcp_id: i64) -> usize {
        sim.calls()
            .into_iter()
            .filter(|c| *c == MseCall::Initialize(ElementRef::VcpId(vcp_id)))
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_loads_items_expected_after_activation() {
        let sim = SimulatedMse::new("mse0");
        let (mut manager, _) = manager(&sim, true).await;
        manager.activate().await.unwrap();

        manager.set_expected_items(vec![pilot(77, false)]).await;
        assert_eq!(initialized(&sim, 77), 0);

        tokio::time::advance(Duration::from_millis(2_500)).await;
        assert!(manager.monitor().await);
        assert_eq!(initialized(&sim, 77), 1);
        assert_eq!(manager.load_counts(), (0, 1));

        // Already loading: not initialized again.
        tokio::time::advance(Duration::from_millis(2_500)).await;
        manager.monitor().await;
        assert_eq!(initialized(&sim, 77), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_counts_only_current_expected_items() {
        let sim = SimulatedMse::new("mse0");
        let (mut manager, _) = manager(&sim, true).await;
        manager.set_expected_items(vec![pilot(1, false), pilot(2, false)]).await;
        manager.activate().await.unwrap();

        tokio::time::advance(Duration::from_millis(2_500)).await;
        manager.monitor().await;
        assert_eq!(manager.load_counts(), (0, 2));

        manager.set_expected_items(vec![pilot(2, false)]).await;
        tokio::time::advance(Duration::from_millis(2_500)).await;
        assert!(manager.monitor().await);
        assert_eq!(manager.load_counts(), (0, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deactivate_clears_cache() {
        let sim = SimulatedMse::new("mse0");
        let (mut manager, _) = manager(&sim, false).await;
        manager.ensure_prepared(&internal("lower"), true).await.unwrap();
        manager.activate().await.unwrap();

        manager.deactivate().await.unwrap();

        assert_eq!(manager.cache_len(), 0);
        assert!(!manager.is_active());
        assert!(!sim.is_active());
    }

    #[tokio::test]
    async fn test_uninitialized_manager_rejects_commands() {
        let sim = SimulatedMse::new("mse0");
        let events = Arc::new(DeviceEventEmitter::new("viz0"));
        let mut manager = ElementManager::new(Arc::new(sim), ManagerOptions::default(), events);

        let err = manager
            .execute(&VizMseAction::Prepare(internal("lower")))
            .await
            .unwrap_err();
        assert_eq!(err.kind, tsr_core::ErrorKind::Config);
    }
}

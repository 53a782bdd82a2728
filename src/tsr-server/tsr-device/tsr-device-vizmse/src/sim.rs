// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! In-process media sequencer.
//!
//! Keeps rundowns and elements in memory and records every call. Failures
//! can be queued per operation to exercise retry and recovery paths.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use tsr_core::{DeviceError, DeviceFuture, DeviceResult};

use crate::peer::{ElementRef, Mse, MseRundown, RemoteElement, RundownInfo};

#[derive(Debug, Clone, PartialEq)]
pub enum MseCall {
    Ping,
    GetRundowns,
    CreateRundown(RundownInfo),
    CreateInternal {
        template_name: String,
        instance_name: String,
        data: Vec<String>,
        channel: Option<String>,
    },
    CreatePilot {
        vcp_id: i64,
        channel: Option<String>,
    },
    GetElement(ElementRef),
    Cue(ElementRef),
    Take(ElementRef),
    Out(ElementRef),
    Continue(ElementRef),
    ContinueReverse(ElementRef),
    Initialize(ElementRef),
    Activate,
    Deactivate,
    Close,
}

impl MseCall {
    fn op(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::GetRundowns => "get_rundowns",
            Self::CreateRundown(_) => "create_rundown",
            Self::CreateInternal { .. } => "create_internal",
            Self::CreatePilot { .. } => "create_pilot",
            Self::GetElement(_) => "get_element",
            Self::Cue(_) => "cue",
            Self::Take(_) => "take",
            Self::Out(_) => "out",
            Self::Continue(_) => "continue",
            Self::ContinueReverse(_) => "continue_reverse",
            Self::Initialize(_) => "initialize",
            Self::Activate => "activate",
            Self::Deactivate => "deactivate",
            Self::Close => "close",
        }
    }
}

#[derive(Default)]
struct SimInner {
    calls: Vec<MseCall>,
    rundowns: Vec<RundownInfo>,
    elements: HashMap<ElementRef, RemoteElement>,
    failures: HashMap<&'static str, VecDeque<DeviceError>>,
    connected: bool,
    active: bool,
}

#[derive(Clone)]
pub struct SimulatedMse {
    host: String,
    inner: Arc<Mutex<SimInner>>,
}

impl SimulatedMse {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            inner: Arc::new(Mutex::new(SimInner {
                connected: true,
                ..SimInner::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimInner> {
        lock(&self.inner)
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<MseCall> {
        self.lock().calls.clone()
    }

    /// Number of calls of operation `op`, e.g. `"take"`.
    pub fn count(&self, op: &str) -> usize {
        self.lock().calls.iter().filter(|c| c.op() == op).count()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Make the next call of `op` fail with `err`.
    pub fn fail_next(&self, op: &'static str, err: DeviceError) {
        self.lock().failures.entry(op).or_default().push_back(err);
    }

    /// Add or replace an element, as if created out of band.
    pub fn put_element(&self, element: RemoteElement) {
        self.lock().elements.insert(element.reference(), element);
    }

    pub fn element(&self, reference: &ElementRef) -> Option<RemoteElement> {
        self.lock().elements.get(reference).cloned()
    }

    pub fn add_rundown(&self, info: RundownInfo) {
        self.lock().rundowns.push(info);
    }

    pub fn set_connected(&self, connected: bool) {
        self.lock().connected = connected;
    }

    pub fn is_active(&self) -> bool {
        self.lock().active
    }

    fn rundown(&self, info: RundownInfo) -> Arc<dyn MseRundown> {
        Arc::new(SimRundown {
            info,
            inner: self.inner.clone(),
        })
    }
}

fn lock(inner: &Mutex<SimInner>) -> MutexGuard<'_, SimInner> {
    inner.lock().unwrap_or_else(|e| e.into_inner())
}

/// Record `call` and pop any failure queued for it.
fn record(inner: &Mutex<SimInner>, call: MseCall) -> DeviceResult<MutexGuard<'_, SimInner>> {
    let mut guard = lock(inner);
    let op = call.op();
    guard.calls.push(call);
    if let Some(err) = guard.failures.get_mut(op).and_then(VecDeque::pop_front) {
        return Err(err);
    }
    if !guard.connected && op != "close" {
        return Err(DeviceError::connection("media sequencer not reachable"));
    }
    Ok(guard)
}

impl Mse for SimulatedMse {
    fn host(&self) -> &str {
        &self.host
    }

    fn ping(&self) -> DeviceFuture<'_, ()> {
        Box::pin(async move {
            record(&self.inner, MseCall::Ping)?;
            Ok(())
        })
    }

    fn get_rundowns(&self) -> DeviceFuture<'_, Vec<Arc<dyn MseRundown>>> {
        Box::pin(async move {
            let infos = record(&self.inner, MseCall::GetRundowns)?.rundowns.clone();
            Ok(infos.into_iter().map(|info| self.rundown(info)).collect())
        })
    }

    fn create_rundown<'a>(&'a self, info: &'a RundownInfo) -> DeviceFuture<'a, Arc<dyn MseRundown>> {
        Box::pin(async move {
            record(&self.inner, MseCall::CreateRundown(info.clone()))?
                .rundowns
                .push(info.clone());
            Ok(self.rundown(info.clone()))
        })
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }

    fn close(&self) -> DeviceFuture<'_, ()> {
        Box::pin(async move {
            record(&self.inner, MseCall::Close)?.connected = false;
            Ok(())
        })
    }
}

struct SimRundown {
    info: RundownInfo,
    inner: Arc<Mutex<SimInner>>,
}

impl SimRundown {
    fn element_call(&self, call: MseCall, element: &ElementRef) -> DeviceResult<()> {
        let guard = record(&self.inner, call)?;
        if !guard.elements.contains_key(element) {
            return Err(DeviceError::remote(format!(
                "PepTalk inexistent error: element {}",
                element
            )));
        }
        Ok(())
    }
}

impl MseRundown for SimRundown {
    fn info(&self) -> &RundownInfo {
        &self.info
    }

    fn create_internal_element<'a>(
        &'a self,
        template_name: &'a str,
        instance_name: &'a str,
        data: &'a [String],
        channel: Option<&'a str>,
    ) -> DeviceFuture<'a, RemoteElement> {
        Box::pin(async move {
            let call = MseCall::CreateInternal {
                template_name: template_name.to_string(),
                instance_name: instance_name.to_string(),
                data: data.to_vec(),
                channel: channel.map(str::to_owned),
            };
            let mut guard = record(&self.inner, call)?;
            let reference = ElementRef::Name(instance_name.to_string());
            if guard.elements.contains_key(&reference) {
                return Err(DeviceError::remote(format!(
                    "An internal graphics element with name '{}' already exists.",
                    instance_name
                )));
            }
            let element = RemoteElement::Internal {
                name: instance_name.to_string(),
            };
            guard.elements.insert(reference, element.clone());
            Ok(element)
        })
    }

    fn create_pilot_element<'a>(&'a self, vcp_id: i64, channel: Option<&'a str>) -> DeviceFuture<'a, RemoteElement> {
        Box::pin(async move {
            let call = MseCall::CreatePilot {
                vcp_id,
                channel: channel.map(str::to_owned),
            };
            let mut guard = record(&self.inner, call)?;
            let element = guard
                .elements
                .entry(ElementRef::VcpId(vcp_id))
                .or_insert(RemoteElement::Pilot {
                    vcp_id,
                    available: 1.0,
                    loaded: 0.0,
                    is_loading: false,
                })
                .clone();
            Ok(element)
        })
    }

    fn get_element<'a>(&'a self, element: &'a ElementRef) -> DeviceFuture<'a, RemoteElement> {
        Box::pin(async move {
            let guard = record(&self.inner, MseCall::GetElement(element.clone()))?;
            guard.elements.get(element).cloned().ok_or_else(|| {
                DeviceError::remote(format!("PepTalk inexistent error: element {}", element))
            })
        })
    }

    fn cue<'a>(&'a self, element: &'a ElementRef) -> DeviceFuture<'a, ()> {
        Box::pin(async move { self.element_call(MseCall::Cue(element.clone()), element) })
    }

    fn take<'a>(&'a self, element: &'a ElementRef) -> DeviceFuture<'a, ()> {
        Box::pin(async move { self.element_call(MseCall::Take(element.clone()), element) })
    }

    fn out<'a>(&'a self, element: &'a ElementRef) -> DeviceFuture<'a, ()> {
        Box::pin(async move { self.element_call(MseCall::Out(element.clone()), element) })
    }

    fn continue_element<'a>(&'a self, element: &'a ElementRef) -> DeviceFuture<'a, ()> {
        Box::pin(async move { self.element_call(MseCall::Continue(element.clone()), element) })
    }

    fn continue_reverse<'a>(&'a self, element: &'a ElementRef) -> DeviceFuture<'a, ()> {
        Box::pin(async move { self.element_call(MseCall::ContinueReverse(element.clone()), element) })
    }

    fn initialize<'a>(&'a self, element: &'a ElementRef) -> DeviceFuture<'a, ()> {
        Box::pin(async move {
            let mut guard = record(&self.inner, MseCall::Initialize(element.clone()))?;
            match guard.elements.get_mut(element) {
                Some(RemoteElement::Pilot { is_loading, .. }) => {
                    *is_loading = true;
                    Ok(())
                }
                Some(RemoteElement::Internal { .. }) => Ok(()),
                None => Err(DeviceError::remote(format!(
                    "PepTalk inexistent error: element {}",
                    element
                ))),
            }
        })
    }

    fn activate(&self) -> DeviceFuture<'_, ()> {
        Box::pin(async move {
            record(&self.inner, MseCall::Activate)?.active = true;
            Ok(())
        })
    }

    fn deactivate(&self) -> DeviceFuture<'_, ()> {
        Box::pin(async move {
            record(&self.inner, MseCall::Deactivate)?.active = false;
            Ok(())
        })
    }
}

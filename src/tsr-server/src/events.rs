// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Forwards device events to the log.

use tracing::{debug, error, info, warn};

use tsr_core::device::controller::{CommandContext, CommandReport};
use tsr_core::{DeviceError, DeviceListener, DeviceStatus};

pub struct LoggingListener;

impl DeviceListener for LoggingListener {
    fn on_connection_changed(&self, device_id: &str, status: &DeviceStatus) {
        info!(
            "[{}] status {:?} {}",
            device_id,
            status.status_code,
            status.messages.join("; ")
        );
    }

    fn on_command_error(&self, device_id: &str, error: &DeviceError, context: &CommandContext) {
        error!(
            "[{}] command {} ({}) failed: {}",
            device_id, context.context, context.timeline_obj_id, error
        );
    }

    fn on_error(&self, device_id: &str, context: &str, error: &DeviceError) {
        error!("[{}] {}: {}", device_id, context, error);
    }

    fn on_info(&self, device_id: &str, message: &str) {
        info!("[{}] {}", device_id, message);
    }

    fn on_warning(&self, device_id: &str, message: &str) {
        warn!("[{}] {}", device_id, message);
    }

    fn on_debug(&self, device_id: &str, message: &str) {
        debug!("[{}] {}", device_id, message);
    }

    fn on_slow_command(&self, device_id: &str, message: &str) {
        warn!("[{}] slow command: {}", device_id, message);
    }

    fn on_command_report(&self, device_id: &str, report: &CommandReport) {
        info!(
            "[{}] {} planned {} sent {} fulfilled {}",
            device_id, report.context, report.planned_time, report.sent_time, report.fulfilled_time
        );
    }
}

//  Copyright (c) Facebook, Inc. and its affiliates.
//  SPDX-License-Identifier: Apache-2.0

use std::time::Instant;

use log::info;

/// A simple struct that allows to do naive timing outputs
///
/// Logger is used as an output source, make sure logger backend is configured
///
/// Log output may look like
/// `[alice | hash size: 10000] elapsed: 0.00625 sec [qps: 1600435]`
///
/// # Example
///
/// ```
/// use common::timer;
/// let t = timer::Timer::new_silent("alice");
/// let values = vec![1, 2, 3];
/// // would send to log info a message like:
/// // [alice | hash size: 3] elapsed 0.231 sec [qps: 2314]
/// t.qps("hash", values.len());
/// ```
pub struct Timer {
    start: Instant,
    label: String,
    silent: bool,
}

impl Timer {
    /// Returns a timer that fires once on drop, `label` prefixing
    /// all of its outputs
    pub fn new(label: &str) -> Timer {
        Timer {
            start: Instant::now(),
            label: String::from(label),
            silent: false,
        }
    }

    /// A silent timer does not fire on drop, only on explicit
    /// `qps`/`elapsed_log` calls
    pub fn new_silent(label: &str) -> Timer {
        Timer {
            start: Instant::now(),
            label: String::from(label),
            silent: true,
        }
    }

    fn format(&self, extra_label: Option<&str>, size: Option<usize>) -> String {
        let e = self.start.elapsed().as_nanos() as f64 / 1e9_f64;

        let fixed_label = extra_label
            .map(|x| format!(" | {}", x))
            .unwrap_or_default();

        let fixed_size = size.map(|x| format!(" size: {}", x)).unwrap_or_default();

        let fixed_qps = size
            .map(|x| format!(" [qps: {:.0}]", (x as f64) / e))
            .unwrap_or_default();

        format!(
            "[{}{}{}] elapsed: {:.5} sec{}",
            self.label, fixed_label, fixed_size, e, fixed_qps
        )
    }

    /// Sends a formatted string with QPS to `log::info`
    pub fn qps(&self, extra_label: &str, size: usize) {
        info!("{}", self.format(Some(extra_label), Some(size)));
    }

    /// Sends a formatted string without the QPS part to `log::info`
    pub fn elapsed_log(&self, extra_label: &str) {
        info!("{}", self.format(Some(extra_label), None));
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if !self.silent {
            info!("{}", self.format(None, None));
        }
    }
}

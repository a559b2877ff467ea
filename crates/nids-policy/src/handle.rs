//! Live/staged configuration handle
//!
//! The packet path loads the live configuration lock-free; a reload builds a
//! staged copy and publishes it at a single commit point. Port-filter
//! mutations during a reload window target the staged copy so in-flight
//! packets keep the configuration they started with.

use crate::UdpPolicyConfig;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};

/// Which configuration a mutation applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigTarget {
    /// The configuration packets are currently processed against
    Live,
    /// The in-progress reload copy; falls back to live when no reload is open
    Staged,
}

/// Atomically-swappable policy configuration.
pub struct PolicyHandle {
    live: ArcSwap<UdpPolicyConfig>,
    staged: Mutex<Option<UdpPolicyConfig>>,
}

impl PolicyHandle {
    /// Wrap a verified configuration
    pub fn new(config: UdpPolicyConfig) -> Self {
        Self {
            live: ArcSwap::from_pointee(config),
            staged: Mutex::new(None),
        }
    }

    /// Current live configuration
    #[inline]
    pub fn current(&self) -> Arc<UdpPolicyConfig> {
        self.live.load_full()
    }

    /// Open a reload window seeded from the live configuration
    pub fn begin_reload(&self) {
        let mut staged = self.staged.lock();
        *staged = Some(self.live.load().as_ref().clone());
        info!("policy reload window opened");
    }

    /// Replace the staged configuration wholesale (full re-parse)
    pub fn stage(&self, config: UdpPolicyConfig) {
        *self.staged.lock() = Some(config);
    }

    /// Publish the staged configuration; no-op when no reload is open
    pub fn commit_reload(&self) {
        match self.staged.lock().take() {
            Some(config) => {
                self.live.store(Arc::new(config));
                info!("policy reload committed");
            }
            None => warn!("commit_reload without an open reload window"),
        }
    }

    /// Drop the staged configuration without publishing it
    pub fn abort_reload(&self) {
        if self.staged.lock().take().is_some() {
            info!("policy reload aborted");
        }
    }

    /// Set port filter status bits on the selected configuration
    pub fn set_port_filter_status(&self, port: u16, status: u16, target: ConfigTarget) {
        self.mutate(target, |config| config.port_filter_mut().set(port, status));
    }

    /// Clear port filter status bits on the selected configuration
    pub fn unset_port_filter_status(&self, port: u16, status: u16, target: ConfigTarget) {
        self.mutate(target, |config| config.port_filter_mut().unset(port, status));
    }

    /// Read port filter status bits from the selected configuration
    pub fn get_port_filter_status(&self, port: u16, target: ConfigTarget) -> u16 {
        if target == ConfigTarget::Staged {
            if let Some(staged) = self.staged.lock().as_ref() {
                return staged.port_filter().get(port);
            }
        }
        self.live.load().port_filter().get(port)
    }

    /// Mutations to the live table go through a copy-and-swap so packet
    /// processing never observes a partially-updated configuration.
    fn mutate(&self, target: ConfigTarget, f: impl FnOnce(&mut UdpPolicyConfig)) {
        if target == ConfigTarget::Staged {
            let mut staged = self.staged.lock();
            if let Some(config) = staged.as_mut() {
                f(config);
                return;
            }
        }
        let mut copy = self.live.load().as_ref().clone();
        f(&mut copy);
        self.live.store(Arc::new(copy));
    }
}

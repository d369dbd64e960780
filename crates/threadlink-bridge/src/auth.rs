// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operator authentication with expiry and a privileged bypass list.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::info;

use threadlink_config::model::AuthConfig;
use threadlink_core::OperatorId;

pub struct OperatorAuth {
    privileged: HashSet<OperatorId>,
    timeout: Duration,
    granted: DashMap<OperatorId, DateTime<Utc>>,
}

impl OperatorAuth {
    pub fn new(config: &AuthConfig) -> Self {
        let timeout_secs = i64::try_from(config.auth_timeout_secs).unwrap_or(i64::MAX);
        Self {
            privileged: config
                .privileged_operators
                .iter()
                .copied()
                .map(OperatorId)
                .collect(),
            timeout: Duration::try_seconds(timeout_secs).unwrap_or(Duration::MAX),
            granted: DashMap::new(),
        }
    }

    pub fn is_privileged(&self, operator: OperatorId) -> bool {
        self.privileged.contains(&operator)
    }

    pub fn grant(&self, operator: OperatorId) {
        self.grant_at(operator, Utc::now());
    }

    pub fn grant_at(&self, operator: OperatorId, at: DateTime<Utc>) {
        info!(operator = %operator, "operator authenticated");
        self.granted.insert(operator, at);
    }

    pub fn revoke(&self, operator: OperatorId) {
        self.granted.remove(&operator);
    }

    pub fn is_authenticated(&self, operator: OperatorId) -> bool {
        self.is_authenticated_at(operator, Utc::now())
    }

    /// Valid while `now - granted_at < timeout`; privileged operators always pass.
    pub fn is_authenticated_at(&self, operator: OperatorId, now: DateTime<Utc>) -> bool {
        if self.is_privileged(operator) {
            return true;
        }
        self.granted
            .get(&operator)
            .is_some_and(|granted_at| now.signed_duration_since(*granted_at) < self.timeout)
    }
}

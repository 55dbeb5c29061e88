// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The admission gate.

use memgate_core::DegradationContext;
use std::sync::Arc;

/// The single check a producer must pass before committing new memory.
///
/// The gate holds no state of its own: every call is a direct atomic read of
/// the shared degradation state, so a transition is visible to the first read
/// after the controller's store.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    context: Arc<DegradationContext>,
}

impl AdmissionGate {
    /// Creates a gate over `context`.
    pub fn new(context: Arc<DegradationContext>) -> Self {
        Self { context }
    }

    /// Returns `true` while admission is suspended.
    pub fn is_degraded(&self) -> bool {
        self.context.is_degraded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memgate_core::DegradationState;

    #[test]
    fn test_gate_reflects_context() {
        let context = Arc::new(DegradationContext::new());
        let gate = AdmissionGate::new(Arc::clone(&context));
        assert!(!gate.is_degraded());

        context.transition(DegradationState::Normal, DegradationState::Degraded);
        assert!(gate.is_degraded());

        context.transition(DegradationState::Degraded, DegradationState::Normal);
        assert!(!gate.is_degraded());
    }
}

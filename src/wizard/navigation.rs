//! Maps navigation tokens in a request to a direction and candidate step

use serde::{Deserialize, Serialize};

use super::error::WizardError;
use super::registry::StepRegistry;
use super::request::WizardRequest;

/// One navigation token and how far it moves the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationAction {
    pub token: String,
    /// Negative moves backward, zero stays, positive moves forward
    pub direction: i32,
}

impl NavigationAction {
    pub fn new(token: impl Into<String>, direction: i32) -> Self {
        Self {
            token: token.into(),
            direction,
        }
    }
}

/// Ordered navigation tokens; the first one present in a request wins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NavigationConfig {
    actions: Vec<NavigationAction>,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self::new(vec![
            NavigationAction::new("wizard_save", 0),
            NavigationAction::new("wizard_continue", 1),
            NavigationAction::new("wizard_previous", -1),
            NavigationAction::new("wizard_next", 1),
        ])
    }
}

impl NavigationConfig {
    pub fn new(actions: Vec<NavigationAction>) -> Self {
        Self { actions }
    }

    pub fn actions(&self) -> &[NavigationAction] {
        &self.actions
    }

    /// Direction of the first configured token found in `request`
    pub fn direction_for(&self, request: &WizardRequest) -> Option<&NavigationAction> {
        self.actions.iter().find(|a| request.has_param(&a.token))
    }

    /// Candidate step and direction for a request made from `current`.
    ///
    /// Without a matching token the user stays on `current` with direction 0.
    pub fn resolve(
        &self,
        registry: &StepRegistry,
        request: &WizardRequest,
        current: &str,
    ) -> Result<(String, i32), WizardError> {
        match self.direction_for(request) {
            Some(action) => {
                let candidate = registry.offset(current, action.direction)?;
                tracing::debug!(
                    token = %action.token,
                    direction = action.direction,
                    from = current,
                    to = candidate,
                    "Navigation action"
                );
                Ok((candidate.to_string(), action.direction))
            }
            None => Ok((current.to_string(), 0)),
        }
    }
}

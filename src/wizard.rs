// Step bookkeeping for the multi-step registration forms

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wizard {
    step: u8,
    steps: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardAction {
    Next,
    Back,
}

impl WizardAction {
    // Anything but an explicit "back" moves forward, like submitting the form
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("back") {
            WizardAction::Back
        } else {
            WizardAction::Next
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Show(Wizard),
    Submit(Wizard),
}

impl Wizard {
    pub fn new(steps: u8) -> Self {
        Wizard { step: 1, steps: steps.max(1) }
    }

    /// Restores a wizard from a posted step number, clamped into range.
    pub fn at(raw_step: &str, steps: u8) -> Self {
        let steps = steps.max(1);
        let step = raw_step.trim().parse::<u8>().unwrap_or(1).clamp(1, steps);
        Wizard { step, steps }
    }

    pub fn step(&self) -> u8 {
        self.step
    }

    pub fn steps(&self) -> u8 {
        self.steps
    }

    pub fn is_terminal(&self) -> bool {
        self.step == self.steps
    }

    pub fn advance(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.step += 1;
        true
    }

    pub fn retreat(&mut self) -> bool {
        if self.step == 1 {
            return false;
        }
        self.step -= 1;
        true
    }

    /// Next on the last step submits; every other action just moves.
    pub fn handle(mut self, action: WizardAction) -> Transition {
        match action {
            WizardAction::Back => {
                self.retreat();
                Transition::Show(self)
            }
            WizardAction::Next if self.is_terminal() => Transition::Submit(self),
            WizardAction::Next => {
                self.advance();
                Transition::Show(self)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HiddenField {
    pub name: String,
    pub value: String,
}

/// Values collected on steps other than `current`, re-posted as hidden inputs.
/// `field_steps` maps each form field to the step that displays it.
pub fn hidden_fields<T: Serialize>(form: &T, field_steps: &[(&str, u8)], current: u8) -> Vec<HiddenField> {
    let Ok(Value::Object(values)) = serde_json::to_value(form) else {
        return Vec::new();
    };
    field_steps
        .iter()
        .filter(|(_, step)| *step != current)
        .filter_map(|(name, _)| {
            let value = match values.get(*name)? {
                Value::String(s) => s.clone(),
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            Some(HiddenField { name: name.to_string(), value })
        })
        .collect()
}

//! Per-form submit state machine.
//!
//! `Pristine → Dirty → Validating → Valid | Invalid → Submitting →
//! Succeeded | Failed`. Validation runs synchronously on every edit, so
//! `Validating` and `Failed` are transient: a failed submission settles in
//! `Invalid` (server field errors) or `Dirty` (anything else).

use std::future::Future;

use anyhow::Result;
use ims_core::{ErrorKind, ImsError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::FieldErrors;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormState {
    Pristine,
    Dirty,
    Validating,
    Valid,
    Invalid,
    Submitting,
    Succeeded,
    Failed,
}

impl FormState {
    pub fn can_submit(&self) -> bool {
        matches!(self, FormState::Valid)
    }
}

pub trait FormField: Copy {
    /// Wire name, also the key in [`FieldErrors`].
    fn name(&self) -> &'static str;
}

/// A form's raw input and how it becomes a typed payload.
pub trait FormDraft: Clone + PartialEq {
    type Field: FormField;
    type Output;

    fn set(&mut self, field: Self::Field, value: &str);

    fn check(&self) -> Result<Self::Output, FieldErrors>;
}

pub struct FormController<D: FormDraft> {
    initial: D,
    draft: D,
    state: FormState,
    errors: FieldErrors,
}

impl<D: FormDraft> FormController<D> {
    pub fn new(draft: D) -> Self {
        Self {
            initial: draft.clone(),
            draft,
            state: FormState::Pristine,
            errors: FieldErrors::new(),
        }
    }

    pub fn state(&self) -> FormState {
        self.state
    }

    pub fn draft(&self) -> &D {
        &self.draft
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn field_error(&self, field: D::Field) -> Option<&str> {
        self.errors.first(field.name())
    }

    /// Whether the draft differs from what the form was opened (or last
    /// saved) with.
    pub fn is_modified(&self) -> bool {
        self.draft != self.initial
    }

    /// Apply an edit and recompute validity. Server errors from a previous
    /// submission are dropped.
    pub fn set_field(&mut self, field: D::Field, value: &str) -> FormState {
        self.draft.set(field, value);
        self.state = FormState::Dirty;
        self.revalidate()
    }

    pub fn revalidate(&mut self) -> FormState {
        self.state = FormState::Validating;
        self.state = match self.draft.check() {
            Ok(_) => {
                self.errors = FieldErrors::new();
                FormState::Valid
            }
            Err(errors) => {
                self.errors = errors;
                FormState::Invalid
            }
        };
        self.state
    }

    /// Discard edits and return to the last saved draft.
    pub fn reset(&mut self) {
        self.draft = self.initial.clone();
        self.errors = FieldErrors::new();
        self.state = FormState::Pristine;
    }

    /// Run `send` with the validated payload.
    ///
    /// A form that is not `Valid` after revalidation is rejected with an
    /// `Unprocessable` error and `send` is never called.
    pub async fn submit<F, Fut, T>(&mut self, send: F) -> Result<T>
    where
        F: FnOnce(D::Output) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if matches!(self.state, FormState::Pristine | FormState::Dirty) {
            self.revalidate();
        }
        if !self.state.can_submit() {
            debug!(state = ?self.state, "submission blocked");
            return Err(self.errors.clone().into_unprocessable("Please correct the highlighted fields"));
        }

        let payload = match self.draft.check() {
            Ok(p) => p,
            Err(errors) => {
                self.errors = errors;
                self.state = FormState::Invalid;
                return Err(self.errors.clone().into_unprocessable("Please correct the highlighted fields"));
            }
        };

        self.state = FormState::Submitting;
        match send(payload).await {
            Ok(v) => {
                self.state = FormState::Succeeded;
                self.initial = self.draft.clone();
                Ok(v)
            }
            Err(err) => {
                self.state = FormState::Failed;
                self.settle_failure(&err);
                Err(err)
            }
        }
    }

    fn settle_failure(&mut self, err: &anyhow::Error) {
        let server_errors = ImsError::from_anyhow(err)
            .filter(|e| e.kind == ErrorKind::Unprocessable)
            .map(|e| match &e.errors {
                Some(v) => FieldErrors::from_server(v),
                None => {
                    let mut fe = FieldErrors::new();
                    fe.push_form(e.message.clone());
                    fe
                }
            });

        match server_errors {
            Some(errors) if !errors.is_empty() => {
                self.errors = errors;
                self.state = FormState::Invalid;
            }
            _ => {
                self.state = FormState::Dirty;
            }
        }
        debug!(state = ?self.state, "submission failed");
    }
}

//! ims-forms: typed form drafts and the submit state machine.

pub mod controller;
pub mod errors;
pub mod interaction;
pub mod login;

pub use controller::{FormController, FormDraft, FormField, FormState};
pub use errors::{FieldErrors, FORM_KEY};
pub use interaction::{InteractionDraft, InteractionField};
pub use login::{LoginDraft, LoginField};

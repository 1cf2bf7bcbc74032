//! Small observable state containers for view flags such as the sidebar
//! and modal dialogs.

use tokio::sync::watch;

/// An open/closed flag that views can subscribe to.
#[derive(Debug)]
pub struct Toggle {
    tx: watch::Sender<bool>,
}

impl Toggle {
    pub fn new(open: bool) -> Self {
        let (tx, _rx) = watch::channel(open);
        Self { tx }
    }

    pub fn is_open(&self) -> bool {
        *self.tx.borrow()
    }

    /// Subscribers are only woken when the value actually changes.
    pub fn open(&self) {
        self.set(true);
    }

    pub fn close(&self) {
        self.set(false);
    }

    /// Flip the flag and return the new value.
    pub fn toggle(&self) -> bool {
        self.tx.send_modify(|open| *open = !*open);
        self.is_open()
    }

    pub fn set(&self, open: bool) {
        self.tx.send_if_modified(|current| {
            if *current == open {
                false
            } else {
                *current = open;
                true
            }
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for Toggle {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Modal dialogs of the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modal {
    NewExamSubject,
    EditExamSubject,
    EditApplication,
    NewStaffMember,
}

/// View flags of the console, one container per concern.
#[derive(Debug, Default)]
pub struct UiState {
    pub sidebar: Toggle,
    new_subject: Toggle,
    edit_subject: Toggle,
    edit_application: Toggle,
    new_staff: Toggle,
}

impl UiState {
    pub fn new() -> Self {
        Self {
            sidebar: Toggle::new(true),
            ..Default::default()
        }
    }

    pub fn modal(&self, modal: Modal) -> &Toggle {
        match modal {
            Modal::NewExamSubject => &self.new_subject,
            Modal::EditExamSubject => &self.edit_subject,
            Modal::EditApplication => &self.edit_application,
            Modal::NewStaffMember => &self.new_staff,
        }
    }

    /// Open one modal, closing any other that is showing.
    pub fn show_modal(&self, modal: Modal) {
        for other in [
            Modal::NewExamSubject,
            Modal::EditExamSubject,
            Modal::EditApplication,
            Modal::NewStaffMember,
        ] {
            if other != modal {
                self.modal(other).close();
            }
        }
        self.modal(modal).open();
    }
}

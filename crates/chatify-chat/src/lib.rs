pub mod decoder;
pub mod event;
pub mod renderer;
pub mod transcript;
pub mod view;


pub use event::{ChatEvent, LoadOutcome, SendOutcome, SendPhase, SendRejected};
pub use renderer::{RenderUpdate, ThrottledRenderer};
pub use transcript::{EntryId, PlaceholderId, Transcript, TranscriptEntry};
pub use view::{ChatContext, ChatView, SendHandle, ViewSnapshot};

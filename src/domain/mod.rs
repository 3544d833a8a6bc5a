pub mod item;
pub mod post;
pub mod subscription;

pub use item::{NormalizedFeed, NormalizedItem, DESCRIPTION_MAX_LEN};
pub use post::SeenPost;
pub use subscription::Subscription;

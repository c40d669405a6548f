pub mod email_client;
pub mod subscriber_email;
pub mod subscriber_record;
pub mod subscriber_repository;
pub mod subscriber_status;
pub mod subscription_token;

pub use crate::domain::email_client::EmailClient;
pub use crate::domain::subscriber_email::SubscriberEmail;
pub use crate::domain::subscriber_record::SubscriberRecord;
pub use crate::domain::subscriber_repository::{ConditionalWrite, SubscriberRepository};
pub use crate::domain::subscriber_status::SubscriberStatus;
pub use crate::domain::subscription_token::SubscriptionToken;

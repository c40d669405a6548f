pub mod dynamodb_subscriber_repository;
pub mod in_memory_subscriber_repository;
pub mod postmark_email_client;

pub use crate::adapters::dynamodb_subscriber_repository::DynamoDbSubscriberRepository;
pub use crate::adapters::in_memory_subscriber_repository::InMemorySubscriberRepository;
pub use crate::adapters::postmark_email_client::PostmarkEmailClient;

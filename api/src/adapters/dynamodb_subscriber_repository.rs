use crate::domain::{
    ConditionalWrite, SubscriberEmail, SubscriberRecord, SubscriberRepository, SubscriberStatus,
    SubscriptionToken,
};
use anyhow::Context;
use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashMap;
use telemetry::get_trace_and_span_id;

const EMAIL: &str = "email";
const STATUS: &str = "status";
const TOKEN: &str = "token";
const SOURCE: &str = "source";
const CREATED_AT: &str = "createdAt";
const EXPIRES_AT: &str = "expiresAt";
const CONFIRMED_AT: &str = "confirmedAt";

#[derive(Debug, Clone)]
pub struct DynamoDbSubscriberRepository {
    client: Client,
    table_name: String,
}

impl DynamoDbSubscriberRepository {
    pub fn new(client: Client, table_name: String) -> Self {
        Self { client, table_name }
    }
}

#[async_trait]
impl SubscriberRepository for DynamoDbSubscriberRepository {
    #[tracing::instrument(skip(self, record), fields(subscriber_email = %record.email))]
    async fn upsert_pending(
        &self,
        record: &SubscriberRecord,
    ) -> Result<ConditionalWrite, anyhow::Error> {
        let mut put_item = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(to_item(record)))
            .condition_expression("attribute_not_exists(#email) OR #status <> :confirmed")
            .expression_attribute_names("#email", EMAIL)
            .expression_attribute_names("#status", STATUS)
            .expression_attribute_values(
                ":confirmed",
                AttributeValue::S(SubscriberStatus::Confirmed.as_ref().to_string()),
            );

        if let Some((trace_id, span_id)) = get_trace_and_span_id() {
            put_item = put_item
                .item("TraceParent", AttributeValue::S(trace_id))
                .item("ParentSpan", AttributeValue::S(span_id));
        }

        match put_item.send().await {
            Ok(_) => Ok(ConditionalWrite::Applied),
            Err(e)
                if e.as_service_error()
                    .map_or(false, |e| e.is_conditional_check_failed_exception()) =>
            {
                Ok(ConditionalWrite::ConditionFailed)
            }
            Err(e) => Err(e).context(format!(
                "Failure writing pending subscriber to DynamoDB. Using table {}",
                &self.table_name
            )),
        }
    }

    #[tracing::instrument(skip(self, email), fields(subscriber_email = %email))]
    async fn get_subscriber(
        &self,
        email: &SubscriberEmail,
    ) -> Result<Option<SubscriberRecord>, anyhow::Error> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(EMAIL, AttributeValue::S(email.to_string()))
            .consistent_read(true)
            .send()
            .await
            .context(format!(
                "Failure reading subscriber from DynamoDB. Using table {}",
                &self.table_name
            ))?;

        output.item.as_ref().map(from_item).transpose()
    }

    #[tracing::instrument(skip(self, email, expected_token), fields(subscriber_email = %email))]
    async fn confirm_subscriber(
        &self,
        email: &SubscriberEmail,
        expected_token: &SubscriptionToken,
        confirmed_at: DateTime<Utc>,
    ) -> Result<ConditionalWrite, anyhow::Error> {
        let trace_details = get_trace_and_span_id();
        let update_expression = match trace_details {
            None => "SET #status = :confirmed, #confirmed_at = :confirmed_at REMOVE #token, #expires_at",
            Some(_) => "SET #status = :confirmed, #confirmed_at = :confirmed_at, TraceParent = :trace_parent, ParentSpan = :parent_span REMOVE #token, #expires_at",
        };

        let mut update = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key(EMAIL, AttributeValue::S(email.to_string()))
            .update_expression(update_expression)
            .condition_expression("#status = :pending AND #token = :token")
            .expression_attribute_names("#status", STATUS)
            .expression_attribute_names("#token", TOKEN)
            .expression_attribute_names("#confirmed_at", CONFIRMED_AT)
            .expression_attribute_names("#expires_at", EXPIRES_AT)
            .expression_attribute_values(
                ":confirmed",
                AttributeValue::S(SubscriberStatus::Confirmed.as_ref().to_string()),
            )
            .expression_attribute_values(
                ":pending",
                AttributeValue::S(SubscriberStatus::Pending.as_ref().to_string()),
            )
            .expression_attribute_values(
                ":token",
                AttributeValue::S(expected_token.as_ref().to_string()),
            )
            .expression_attribute_values(
                ":confirmed_at",
                AttributeValue::S(format_timestamp(confirmed_at)),
            );

        if let Some((trace_id, span_id)) = trace_details {
            update = update
                .expression_attribute_values(":trace_parent", AttributeValue::S(trace_id))
                .expression_attribute_values(":parent_span", AttributeValue::S(span_id));
        }

        match update.send().await {
            Ok(_) => Ok(ConditionalWrite::Applied),
            Err(e)
                if e.as_service_error()
                    .map_or(false, |e| e.is_conditional_check_failed_exception()) =>
            {
                Ok(ConditionalWrite::ConditionFailed)
            }
            Err(e) => Err(e).context(format!(
                "Failure confirming subscriber in DynamoDB. Using table {}",
                &self.table_name
            )),
        }
    }
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn to_item(record: &SubscriberRecord) -> HashMap<String, AttributeValue> {
    let mut item = HashMap::from([
        (EMAIL.to_string(), AttributeValue::S(record.email.to_string())),
        (
            STATUS.to_string(),
            AttributeValue::S(record.status.as_ref().to_string()),
        ),
        (SOURCE.to_string(), AttributeValue::S(record.source.clone())),
        (
            CREATED_AT.to_string(),
            AttributeValue::S(format_timestamp(record.created_at)),
        ),
    ]);

    if let Some(token) = &record.token {
        item.insert(TOKEN.to_string(), AttributeValue::S(token.as_ref().to_string()));
    }
    if let Some(expires_at) = record.expires_at {
        item.insert(
            EXPIRES_AT.to_string(),
            AttributeValue::N(expires_at.timestamp().to_string()),
        );
    }
    if let Some(confirmed_at) = record.confirmed_at {
        item.insert(
            CONFIRMED_AT.to_string(),
            AttributeValue::S(format_timestamp(confirmed_at)),
        );
    }

    item
}

fn from_item(item: &HashMap<String, AttributeValue>) -> Result<SubscriberRecord, anyhow::Error> {
    let email = SubscriberEmail::parse(required_string(item, EMAIL)?)
        .map_err(|e| anyhow::anyhow!(e))
        .context("Stored subscriber has an invalid email")?;
    let status = SubscriberStatus::parse(&required_string(item, STATUS)?)
        .map_err(|e| anyhow::anyhow!(e))
        .context("Stored subscriber has an invalid status")?;
    let token = optional_string(item, TOKEN)?
        .map(SubscriptionToken::parse)
        .transpose()
        .map_err(|e| anyhow::anyhow!(e))
        .context("Stored subscriber has an invalid token")?;
    let source = optional_string(item, SOURCE)?.unwrap_or_default();
    let created_at = parse_timestamp(&required_string(item, CREATED_AT)?)?;
    let confirmed_at = optional_string(item, CONFIRMED_AT)?
        .map(|value| parse_timestamp(&value))
        .transpose()?;
    let expires_at = match item.get(EXPIRES_AT) {
        None => None,
        Some(value) => {
            let seconds = value
                .as_n()
                .map_err(|_| anyhow::anyhow!("Attribute {} is not a number", EXPIRES_AT))?
                .parse::<i64>()
                .context("Attribute expiresAt is not an integer")?;
            Some(
                DateTime::<Utc>::from_timestamp(seconds, 0)
                    .ok_or_else(|| anyhow::anyhow!("Attribute expiresAt is out of range"))?,
            )
        }
    };

    Ok(SubscriberRecord {
        email,
        status,
        token,
        source,
        created_at,
        confirmed_at,
        expires_at,
    })
}

fn required_string(
    item: &HashMap<String, AttributeValue>,
    key: &str,
) -> Result<String, anyhow::Error> {
    optional_string(item, key)?.ok_or_else(|| anyhow::anyhow!("Attribute {} is missing", key))
}

fn optional_string(
    item: &HashMap<String, AttributeValue>,
    key: &str,
) -> Result<Option<String>, anyhow::Error> {
    item.get(key)
        .map(|value| {
            value
                .as_s()
                .cloned()
                .map_err(|_| anyhow::anyhow!("Attribute {} is not a string", key))
        })
        .transpose()
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, anyhow::Error> {
    Ok(DateTime::parse_from_rfc3339(value)
        .context(format!("{} is not an RFC 3339 timestamp", value))?
        .with_timezone(&Utc))
}

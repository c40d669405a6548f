mod health_check;
mod subscriptions;
mod subscriptions_confirm;

mod admin;
mod helpers;
mod payment_flows;
mod ussd;

//! reqwest-based [`CommerceApi`] implementation speaking GraphQL over HTTP.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http::header::CACHE_CONTROL;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::instrument;
use url::Url;

use crate::config::AppConfig;
use crate::errors::CheckoutError;
use crate::models::{Checkout, CheckoutId, CheckoutLine, Money, Order, OrderId, OrderLine};

use super::{CommerceApi, CompletionData, FetchPolicy, FieldError};

const CHECKOUT_FRAGMENT: &str = r#"
fragment CheckoutFields on Checkout {
  id
  channel { slug }
  languageCode
  lines {
    id
    quantity
    variant { id }
    totalPrice { gross { amount currency } }
  }
  totalPrice { gross { amount currency } }
}
"#;

const ORDER_FRAGMENT: &str = r#"
fragment OrderFields on Order {
  id
  number
  userEmail
  created
  total { gross { amount currency } }
  discounts { amount { amount currency } }
  lines {
    productName
    quantity
    variant { id }
    totalPrice { gross { amount currency } }
  }
}
"#;

#[derive(Clone)]
pub struct GraphqlCommerceApi {
    http: Client,
    endpoint: Url,
}

impl GraphqlCommerceApi {
    pub fn new(config: &AppConfig) -> Result<Self, CheckoutError> {
        let endpoint = Url::parse(&config.commerce_api_url)
            .map_err(|e| CheckoutError::ConfigError(format!("invalid commerce API URL: {}", e)))?;
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self { http, endpoint })
    }

    async fn execute(
        &self,
        query: String,
        variables: Value,
        policy: FetchPolicy,
    ) -> Result<Value, CheckoutError> {
        let mut request = self
            .http
            .post(self.endpoint.clone())
            .json(&json!({ "query": query, "variables": variables }));
        if policy == FetchPolicy::NetworkOnly {
            request = request.header(CACHE_CONTROL, "no-cache");
        }

        let response: GraphqlResponse = request.send().await?.error_for_status()?.json().await?;

        if let Some(errors) = response.errors.filter(|e| !e.is_empty()) {
            let joined = errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(CheckoutError::Backend(joined));
        }

        response
            .data
            .ok_or_else(|| CheckoutError::Backend("response carried no data".to_string()))
    }
}

#[async_trait]
impl CommerceApi for GraphqlCommerceApi {
    #[instrument(skip(self))]
    async fn checkout_by_id(
        &self,
        id: &CheckoutId,
        locale: &str,
        policy: FetchPolicy,
    ) -> Result<Option<Checkout>, CheckoutError> {
        let query = format!(
            "query CheckoutById($id: ID!, $locale: LanguageCodeEnum!) {{ checkout(id: $id, languageCode: $locale) {{ ...CheckoutFields }} }}{}",
            CHECKOUT_FRAGMENT
        );
        let data = self
            .execute(
                query,
                json!({ "id": id.as_str(), "locale": graphql_locale(locale) }),
                policy,
            )
            .await?;
        let payload: CheckoutByIdData = serde_json::from_value(data)?;
        Ok(payload.checkout.map(Checkout::from))
    }

    #[instrument(skip(self))]
    async fn checkout_create(
        &self,
        channel: &str,
        locale: &str,
        variant_id: &str,
        quantity: i32,
    ) -> Result<Checkout, CheckoutError> {
        let query = format!(
            "mutation CheckoutCreate($channel: String!, $locale: LanguageCodeEnum!, $lines: [CheckoutLineInput!]!) {{ checkoutCreate(input: {{ channel: $channel, languageCode: $locale, lines: $lines }}) {{ checkout {{ ...CheckoutFields }} errors {{ field code message }} }} }}{}",
            CHECKOUT_FRAGMENT
        );
        let data = self
            .execute(
                query,
                json!({
                    "channel": channel,
                    "locale": graphql_locale(locale),
                    "lines": [{ "variantId": variant_id, "quantity": quantity }],
                }),
                FetchPolicy::NetworkOnly,
            )
            .await?;
        let payload: CheckoutCreateData = serde_json::from_value(data)?;
        payload.checkout_create.into_checkout()
    }

    #[instrument(skip(self))]
    async fn checkout_lines_add(
        &self,
        id: &CheckoutId,
        variant_id: &str,
        quantity: i32,
    ) -> Result<Checkout, CheckoutError> {
        let query = format!(
            "mutation CheckoutLinesAdd($id: ID!, $lines: [CheckoutLineInput!]!) {{ checkoutLinesAdd(id: $id, lines: $lines) {{ checkout {{ ...CheckoutFields }} errors {{ field code message }} }} }}{}",
            CHECKOUT_FRAGMENT
        );
        let data = self
            .execute(
                query,
                json!({
                    "id": id.as_str(),
                    "lines": [{ "variantId": variant_id, "quantity": quantity }],
                }),
                FetchPolicy::NetworkOnly,
            )
            .await?;
        let payload: CheckoutLinesAddData = serde_json::from_value(data)?;
        payload.checkout_lines_add.into_checkout()
    }

    #[instrument(skip(self))]
    async fn checkout_lines_delete(
        &self,
        id: &CheckoutId,
        line_id: &str,
    ) -> Result<Checkout, CheckoutError> {
        let query = format!(
            "mutation CheckoutLinesDelete($id: ID!, $linesIds: [ID!]!) {{ checkoutLinesDelete(id: $id, linesIds: $linesIds) {{ checkout {{ ...CheckoutFields }} errors {{ field code message }} }} }}{}",
            CHECKOUT_FRAGMENT
        );
        let data = self
            .execute(
                query,
                json!({ "id": id.as_str(), "linesIds": [line_id] }),
                FetchPolicy::NetworkOnly,
            )
            .await?;
        let payload: CheckoutLinesDeleteData = serde_json::from_value(data)?;
        payload.checkout_lines_delete.into_checkout()
    }

    #[instrument(skip(self))]
    async fn checkout_complete(&self, id: &CheckoutId) -> Result<CompletionData, CheckoutError> {
        let query = format!(
            "mutation CheckoutComplete($id: ID!) {{ checkoutComplete(id: $id) {{ order {{ ...OrderFields }} errors {{ field code message }} }} }}{}",
            ORDER_FRAGMENT
        );
        let data = self
            .execute(query, json!({ "id": id.as_str() }), FetchPolicy::NetworkOnly)
            .await?;
        let payload: CheckoutCompleteData = serde_json::from_value(data)?;
        Ok(CompletionData {
            order: payload.checkout_complete.order.map(Order::from),
            errors: payload.checkout_complete.errors,
        })
    }

    #[instrument(skip(self))]
    async fn order_by_id(&self, id: &OrderId) -> Result<Option<Order>, CheckoutError> {
        let query = format!(
            "query OrderById($id: ID!) {{ order(id: $id) {{ ...OrderFields }} }}{}",
            ORDER_FRAGMENT
        );
        // Order materialization races this read; caches must not answer it.
        let data = self
            .execute(query, json!({ "id": id.as_str() }), FetchPolicy::NetworkOnly)
            .await?;
        let payload: OrderByIdData = serde_json::from_value(data)?;
        Ok(payload.order.map(Order::from))
    }

    #[instrument(skip(self))]
    async fn transaction_initialize(
        &self,
        id: &CheckoutId,
        gateway_id: &str,
    ) -> Result<Value, CheckoutError> {
        let query = "mutation TransactionInitialize($id: ID!, $paymentGateway: PaymentGatewayToInitialize!) { transactionInitialize(id: $id, paymentGateway: $paymentGateway) { data errors { field code message } } }".to_string();
        let data = self
            .execute(
                query,
                json!({ "id": id.as_str(), "paymentGateway": { "id": gateway_id } }),
                FetchPolicy::NetworkOnly,
            )
            .await?;
        let payload: TransactionInitializeData = serde_json::from_value(data)?;
        if let Some(err) = payload.transaction_initialize.errors.first() {
            return Err(CheckoutError::PaymentFailed(err.message.clone()));
        }
        payload
            .transaction_initialize
            .data
            .ok_or_else(|| {
                CheckoutError::PaymentFailed("gateway returned no session data".to_string())
            })
    }
}

/// The backend takes locale tags as SCREAMING_SNAKE enum values.
fn graphql_locale(locale: &str) -> String {
    locale.replace('-', "_").to_uppercase()
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<Value>,
    errors: Option<Vec<GraphqlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct MoneyWire {
    amount: Decimal,
    currency: String,
}

impl From<MoneyWire> for Money {
    fn from(wire: MoneyWire) -> Self {
        Money::new(wire.amount, wire.currency)
    }
}

#[derive(Debug, Deserialize)]
struct TaxedMoneyWire {
    gross: MoneyWire,
}

#[derive(Debug, Deserialize)]
struct VariantWire {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutLineWire {
    id: String,
    quantity: i32,
    variant: VariantWire,
    total_price: TaxedMoneyWire,
}

#[derive(Debug, Deserialize)]
struct ChannelWire {
    slug: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutWire {
    id: String,
    channel: ChannelWire,
    language_code: String,
    lines: Vec<CheckoutLineWire>,
    total_price: TaxedMoneyWire,
}

impl From<CheckoutWire> for Checkout {
    fn from(wire: CheckoutWire) -> Self {
        Checkout {
            id: CheckoutId::new(wire.id),
            channel: wire.channel.slug,
            locale: wire.language_code,
            lines: wire
                .lines
                .into_iter()
                .map(|line| CheckoutLine {
                    id: line.id,
                    variant_id: line.variant.id,
                    quantity: line.quantity,
                    total: line.total_price.gross.into(),
                })
                .collect(),
            total: wire.total_price.gross.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DiscountWire {
    amount: MoneyWire,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderLineWire {
    product_name: String,
    quantity: i32,
    variant: Option<VariantWire>,
    total_price: TaxedMoneyWire,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderWire {
    id: String,
    number: String,
    user_email: Option<String>,
    created: DateTime<Utc>,
    total: TaxedMoneyWire,
    discounts: Option<Vec<DiscountWire>>,
    lines: Vec<OrderLineWire>,
}

impl From<OrderWire> for Order {
    fn from(wire: OrderWire) -> Self {
        Order {
            id: OrderId::new(wire.id),
            number: wire.number,
            email: wire.user_email,
            total: wire.total.gross.into(),
            discount: wire
                .discounts
                .and_then(|d| d.into_iter().next())
                .map(|d| d.amount.into()),
            lines: wire
                .lines
                .into_iter()
                .map(|line| OrderLine {
                    variant_id: line.variant.map(|v| v.id).unwrap_or_default(),
                    product_name: line.product_name,
                    quantity: line.quantity,
                    total: line.total_price.gross.into(),
                })
                .collect(),
            created_at: wire.created,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CheckoutByIdData {
    checkout: Option<CheckoutWire>,
}

#[derive(Debug, Deserialize)]
struct MutationPayload {
    checkout: Option<CheckoutWire>,
    #[serde(default)]
    errors: Vec<FieldError>,
}

impl MutationPayload {
    fn into_checkout(self) -> Result<Checkout, CheckoutError> {
        if let Some(err) = self.errors.first() {
            return Err(CheckoutError::InvalidOperation(err.message.clone()));
        }
        self.checkout.map(Checkout::from).ok_or_else(|| {
            CheckoutError::Backend("mutation returned neither checkout nor errors".to_string())
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutCreateData {
    checkout_create: MutationPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutLinesAddData {
    checkout_lines_add: MutationPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutLinesDeleteData {
    checkout_lines_delete: MutationPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutCompletePayload {
    order: Option<OrderWire>,
    #[serde(default)]
    errors: Vec<FieldError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutCompleteData {
    checkout_complete: CheckoutCompletePayload,
}

#[derive(Debug, Deserialize)]
struct OrderByIdData {
    order: Option<OrderWire>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionInitializePayload {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<FieldError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionInitializeData {
    transaction_initialize: TransactionInitializePayload,
}

use super::dto::{OrderAck, OrderSide};
use super::rest::GmoRestClient;
use crate::domain::errors::GatewayError;
use crate::domain::market::Symbol;
use rust_decimal::Decimal;
use serde::Serialize;

/// Fresh idempotency id for order payloads. A write carrying one of these
/// is safe to resend after a transport failure.
pub fn new_client_order_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Execution style accepted by the order-entry endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionType {
    Market,
    Limit,
    Stop,
    Oco,
}

/// `POST /v1/speedOrder`: immediate market entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeedOrderRequest {
    pub symbol: Symbol,
    pub side: OrderSide,
    pub size: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower_bound: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<Decimal>,
}

/// `POST /v1/order`: plain new order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub symbol: Symbol,
    pub side: OrderSide,
    pub size: Decimal,
    pub execution_type: ExecutionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oco_limit_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oco_stop_price: Option<Decimal>,
}

/// `POST /v1/ifdOrder`: entry order with an attached settle order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IfdOrderRequest {
    pub symbol: Symbol,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
    pub first_side: OrderSide,
    pub first_execution_type: ExecutionType,
    pub first_size: Decimal,
    pub first_price: Decimal,
    pub second_execution_type: ExecutionType,
    pub second_size: Decimal,
    pub second_price: Decimal,
}

/// `POST /v1/ifoOrder`: entry order with an attached OCO settle pair.
/// This is the composite used to realise the TFQE management contract
/// (stop-loss plus take-profit bracketing one entry).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IfoOrderRequest {
    pub symbol: Symbol,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
    pub first_side: OrderSide,
    pub first_execution_type: ExecutionType,
    pub first_size: Decimal,
    pub first_price: Decimal,
    pub second_limit_price: Decimal,
    pub second_stop_price: Decimal,
    pub second_size: Decimal,
}

/// `POST /v1/changeOrder`: reprice a working order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeOrderRequest {
    pub order_id: i64,
    pub price: Decimal,
}

/// `POST /v1/cancelOrders`: cancel by root order ids.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrdersRequest {
    pub root_order_ids: Vec<i64>,
}

/// `POST /v1/cancelBulkOrder`: cancel everything matching a filter.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelBulkOrderRequest {
    pub symbols: Vec<Symbol>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side: Option<OrderSide>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settle_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlePosition {
    pub position_id: i64,
    pub size: Decimal,
}

/// `POST /v1/closeOrder`: settle specific open positions.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseOrderRequest {
    pub symbol: Symbol,
    pub side: OrderSide,
    pub execution_type: ExecutionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settle_position: Option<Vec<SettlePosition>>,
}

impl GmoRestClient {
    fn ensure_trading_enabled(&self) -> Result<(), GatewayError> {
        if self.trading_enabled {
            Ok(())
        } else {
            Err(GatewayError::Config(
                "order endpoints are disabled; set trading.enabled to reach them".into(),
            ))
        }
    }

    async fn submit<R: Serialize>(
        &self,
        path: &str,
        request: &R,
        client_order_id: Option<&str>,
    ) -> Result<Vec<OrderAck>, GatewayError> {
        self.ensure_trading_enabled()?;
        let body = serde_json::to_string(request)
            .map_err(|e| GatewayError::Internal(format!("order serialisation: {e}")))?;
        // Only requests carrying a client order id are safe to resend.
        let retryable = client_order_id.is_some();
        let decoded = self
            .private_write::<Vec<OrderAck>>("POST", path, &body, retryable)
            .await?;
        Ok(decoded.data)
    }

    pub async fn speed_order(
        &self,
        request: &SpeedOrderRequest,
    ) -> Result<Vec<OrderAck>, GatewayError> {
        self.submit("/v1/speedOrder", request, request.client_order_id.as_deref())
            .await
    }

    pub async fn order(&self, request: &OrderRequest) -> Result<Vec<OrderAck>, GatewayError> {
        self.submit("/v1/order", request, request.client_order_id.as_deref())
            .await
    }

    pub async fn ifd_order(
        &self,
        request: &IfdOrderRequest,
    ) -> Result<Vec<OrderAck>, GatewayError> {
        self.submit("/v1/ifdOrder", request, request.client_order_id.as_deref())
            .await
    }

    pub async fn ifo_order(
        &self,
        request: &IfoOrderRequest,
    ) -> Result<Vec<OrderAck>, GatewayError> {
        self.submit("/v1/ifoOrder", request, request.client_order_id.as_deref())
            .await
    }

    pub async fn change_order(
        &self,
        request: &ChangeOrderRequest,
    ) -> Result<Vec<OrderAck>, GatewayError> {
        // Repricing an already-working order is idempotent.
        self.ensure_trading_enabled()?;
        let body = serde_json::to_string(request)
            .map_err(|e| GatewayError::Internal(format!("order serialisation: {e}")))?;
        let decoded = self
            .private_write::<Vec<OrderAck>>("POST", "/v1/changeOrder", &body, true)
            .await?;
        Ok(decoded.data)
    }

    pub async fn cancel_orders(
        &self,
        request: &CancelOrdersRequest,
    ) -> Result<Vec<OrderAck>, GatewayError> {
        self.ensure_trading_enabled()?;
        let body = serde_json::to_string(request)
            .map_err(|e| GatewayError::Internal(format!("order serialisation: {e}")))?;
        let decoded = self
            .private_write::<Vec<OrderAck>>("POST", "/v1/cancelOrders", &body, true)
            .await?;
        Ok(decoded.data)
    }

    pub async fn cancel_bulk_order(
        &self,
        request: &CancelBulkOrderRequest,
    ) -> Result<Vec<OrderAck>, GatewayError> {
        self.ensure_trading_enabled()?;
        let body = serde_json::to_string(request)
            .map_err(|e| GatewayError::Internal(format!("order serialisation: {e}")))?;
        let decoded = self
            .private_write::<Vec<OrderAck>>("POST", "/v1/cancelBulkOrder", &body, true)
            .await?;
        Ok(decoded.data)
    }

    pub async fn close_order(
        &self,
        request: &CloseOrderRequest,
    ) -> Result<Vec<OrderAck>, GatewayError> {
        self.submit("/v1/closeOrder", request, request.client_order_id.as_deref())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::core::rate_limiter::{RateLimitConfig, RateLimiter};
    use crate::infrastructure::gmo::signer::RequestSigner;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn read_only_client() -> GmoRestClient {
        GmoRestClient::new(
            Arc::new(RateLimiter::new(RateLimitConfig::default())),
            Some(Arc::new(RequestSigner::new(
                "key".into(),
                "secret".into(),
                5000,
            ))),
            "https://forex-api.coin.z.com/public".into(),
            "https://forex-api.coin.z.com/private".into(),
            false,
        )
    }

    #[tokio::test]
    async fn test_orders_unreachable_without_trading_flag() {
        let client = read_only_client();
        let request = SpeedOrderRequest {
            symbol: Symbol::USD_JPY,
            side: OrderSide::Buy,
            size: dec!(10000),
            client_order_id: None,
            lower_bound: None,
            upper_bound: None,
        };
        let err = client.speed_order(&request).await.unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
    }

    #[test]
    fn test_client_order_ids_are_unique_and_header_safe() {
        let a = new_client_order_id();
        let b = new_client_order_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_order_request_wire_shape() {
        let request = OrderRequest {
            symbol: Symbol::USD_JPY,
            side: OrderSide::Buy,
            size: dec!(10000),
            execution_type: ExecutionType::Limit,
            client_order_id: Some("abc-123".into()),
            limit_price: Some(dec!(150.120)),
            stop_price: None,
            oco_limit_price: None,
            oco_stop_price: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["symbol"], "USD_JPY");
        assert_eq!(json["side"], "BUY");
        assert_eq!(json["executionType"], "LIMIT");
        assert_eq!(json["limitPrice"], "150.120");
        assert_eq!(json["clientOrderId"], "abc-123");
        assert!(json.get("stopPrice").is_none());
    }

    #[test]
    fn test_ifo_request_wire_shape() {
        let request = IfoOrderRequest {
            symbol: Symbol::EUR_USD,
            client_order_id: None,
            first_side: OrderSide::Sell,
            first_execution_type: ExecutionType::Limit,
            first_size: dec!(10000),
            first_price: dec!(1.08000),
            second_limit_price: dec!(1.07000),
            second_stop_price: dec!(1.08500),
            second_size: dec!(10000),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["firstSide"], "SELL");
        assert_eq!(json["secondLimitPrice"], "1.07000");
        assert_eq!(json["secondStopPrice"], "1.08500");
    }
}

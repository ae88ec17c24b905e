use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::{header, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use std::time::Instant;
use tracing::{debug, instrument, warn};

use super::types::*;
use super::{CourierError, CourierGateway, CourierResult};
use crate::config::CourierConfig;

const GENERIC_FAILURE: &str = "courier request failed";

/// Bearer-authenticated JSON client for the courier aggregator
#[derive(Clone, Debug)]
pub struct HttpCourierGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpCourierGateway {
    pub fn new(config: &CourierConfig) -> Result<Self, CourierError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| CourierError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<Q, T>(&self, operation: &'static str, path: &str, query: &Q) -> CourierResult<T>
    where
        Q: Serialize + ?Sized,
        T: DeserializeOwned + Acknowledged,
    {
        let request = self.client.get(self.url(path)).query(query);
        self.send(operation, request).await
    }

    async fn post<B, T>(&self, operation: &'static str, path: &str, body: &B) -> CourierResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned + Acknowledged,
    {
        let request = self.client.post(self.url(path)).json(body);
        self.send(operation, request).await
    }

    async fn lookup(
        &self,
        operation: &'static str,
        path: &str,
        body: serde_json::Value,
    ) -> CourierResult<serde_json::Value> {
        let response: LookupResponse = self.post(operation, path, &body).await?;
        Ok(response.data)
    }

    /// Sends the request and normalizes every failure into a [`CourierError`].
    /// The provider's `text` wins over `message`, which wins over a generic message.
    async fn send<T>(&self, operation: &'static str, request: RequestBuilder) -> CourierResult<T>
    where
        T: DeserializeOwned + Acknowledged,
    {
        let start = Instant::now();
        let result = self.send_inner(operation, request).await;
        histogram!(
            "courier_gateway.request_seconds",
            start.elapsed().as_secs_f64(),
            "operation" => operation
        );
        if let Err(err) = &result {
            counter!("courier_gateway.failures", 1, "operation" => operation);
            warn!(operation, error = %err, "courier request failed");
        }
        result
    }

    async fn send_inner<T>(&self, operation: &'static str, request: RequestBuilder) -> CourierResult<T>
    where
        T: DeserializeOwned + Acknowledged,
    {
        let response = request
            .bearer_auth(&self.api_key)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        debug!(operation, http_status = status.as_u16(), "courier response received");

        if !status.is_success() {
            let message = serde_json::from_slice::<ProviderErrorBody>(&bytes)
                .ok()
                .and_then(ProviderErrorBody::into_message)
                .unwrap_or_else(|| format!("{} (HTTP {})", GENERIC_FAILURE, status.as_u16()));
            return Err(CourierError::Rejected(message));
        }

        let body: T =
            serde_json::from_slice(&bytes).map_err(|e| CourierError::Decode(e.to_string()))?;

        if !body.is_ok() {
            let message = body
                .text()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or(GENERIC_FAILURE);
            return Err(CourierError::Rejected(message.to_string()));
        }

        Ok(body)
    }
}

#[async_trait]
impl CourierGateway for HttpCourierGateway {
    #[instrument(skip(self), fields(origin = query.origin_district_id, destination = query.destination_district_id))]
    async fn check_rate(&self, query: &RateQuery) -> CourierResult<Vec<CourierRate>> {
        let response: CheckPricingResponse = self
            .get("check_rate", "/api/mitra/v2/check-price", query)
            .await?;
        Ok(response.data)
    }

    #[instrument(skip(self, request), fields(packages = request.packages.len()))]
    async fn request_pickup(&self, request: &PickupRequest) -> CourierResult<PickupResponse> {
        self.post("request_pickup", "/api/mitra/v5/request_pickup", request)
            .await
    }

    #[instrument(skip(self))]
    async fn track(&self, awb: &str) -> CourierResult<TrackingResponse> {
        self.get("track", "/api/mitra/v2/shTracking", &[("awb", awb)])
            .await
    }

    #[instrument(skip(self))]
    async fn void_order(&self, order_number: &str, reason: &str) -> CourierResult<CancelResponse> {
        let body = VoidOrderRequest {
            order_id: order_number.to_string(),
            reason: reason.to_string(),
        };
        self.post("void_order", "/api/mitra/v2/order/void", &body)
            .await
    }

    #[instrument(skip(self))]
    async fn cancel_awb(&self, awb: &str, reason: &str) -> CourierResult<CancelResponse> {
        let body = CancelAwbRequest {
            awb: awb.to_string(),
            reason: reason.to_string(),
        };
        self.post("cancel_awb", "/api/mitra/v3/cancel_shipment", &body)
            .await
    }

    async fn provinces(&self) -> CourierResult<serde_json::Value> {
        self.lookup("provinces", "/api/mitra/province", json!({}))
            .await
    }

    async fn cities(&self, province_id: i64) -> CourierResult<serde_json::Value> {
        self.lookup("cities", "/api/mitra/city", json!({ "provinsi_id": province_id }))
            .await
    }

    async fn districts(&self, city_id: i64) -> CourierResult<serde_json::Value> {
        self.lookup(
            "districts",
            "/api/mitra/kecamatan",
            json!({ "kabupaten_id": city_id }),
        )
        .await
    }

    async fn sub_districts(&self, district_id: i64) -> CourierResult<serde_json::Value> {
        self.lookup(
            "sub_districts",
            "/api/mitra/kelurahan",
            json!({ "kecamatan_id": district_id }),
        )
        .await
    }

    async fn search_address(&self, keyword: &str) -> CourierResult<serde_json::Value> {
        self.lookup(
            "search_address",
            "/api/mitra/v2/get_address_by_name",
            json!({ "search": keyword }),
        )
        .await
    }

    async fn pickup_schedules(&self) -> CourierResult<serde_json::Value> {
        self.lookup("pickup_schedules", "/api/mitra/v2/schedules", json!({}))
            .await
    }

    async fn couriers(&self) -> CourierResult<serde_json::Value> {
        self.lookup("couriers", "/api/mitra/couriers", json!({}))
            .await
    }
}

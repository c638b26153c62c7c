//! HTTP clients for worker-to-worker calls
//!
//! Each client maps transport failures and error statuses to the error type
//! of the port it implements. None of them retries on its own; retry policy
//! belongs to the queue (per document) and the orchestrator (per poll).

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use docflow_domain::aggregator::AggregatorSnapshot;
use docflow_domain::document::DocumentRef;
use docflow_domain::orchestrator::{ClientError, WorkerEndpoint};
use docflow_domain::ports::{AggregatorClient, ProcessorClient, QueueClient};
use docflow_domain::processor::ProcessAck;
use docflow_domain::queue::{DispatchError, QueueStatus};

use crate::protocol::{
    endpoints, url, ErrorBody, ProcessRequest, ReadyResponse, RegisterProcessorsRequest,
    SubmitDocumentsRequest,
};

/// Read an error response body, falling back to the raw text
async fn error_body(response: Response) -> ErrorBody {
    let status = response.status();
    match response.text().await {
        Ok(text) => serde_json::from_str(&text)
            .unwrap_or_else(|_| ErrorBody::new(status.as_str(), text)),
        Err(e) => ErrorBody::new(status.as_str(), e),
    }
}

async fn send(request: RequestBuilder) -> Result<Response, ClientError> {
    let response = request
        .send()
        .await
        .map_err(|e| ClientError::unreachable(e.to_string()))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = error_body(response).await;
    Err(ClientError::rejected(status.as_u16(), body.error))
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ClientError> {
    send(request)
        .await?
        .json()
        .await
        .map_err(|e| ClientError::protocol(e.to_string()))
}

/// Queue → processor calls
#[derive(Debug, Clone)]
pub struct HttpProcessorClient {
    client: Client,
    timeout: Duration,
}

impl HttpProcessorClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            timeout,
        }
    }
}

impl ProcessorClient for HttpProcessorClient {
    #[instrument(skip(self, reference), fields(document = %reference))]
    fn process(
        &self,
        processor: &str,
        reference: &DocumentRef,
    ) -> impl Future<Output = Result<ProcessAck, DispatchError>> + Send {
        let request = self
            .client
            .post(url(processor, endpoints::PROCESS))
            .timeout(self.timeout)
            .json(&ProcessRequest {
                document: reference.clone(),
            });

        async move {
            let response = request
                .send()
                .await
                .map_err(|e| DispatchError::unavailable(e.to_string()))?;

            let status = response.status();
            if status.is_success() {
                return response
                    .json::<ProcessAck>()
                    .await
                    .map_err(|e| DispatchError::unavailable(format!("unreadable ack: {}", e)));
            }

            let body = error_body(response).await;
            debug!(status = %status, kind = %body.kind, "Processor refused document");

            if status == StatusCode::UNPROCESSABLE_ENTITY {
                Err(DispatchError::rejected(body.kind, body.error))
            } else {
                Err(DispatchError::unavailable(format!("{}: {}", status, body.error)))
            }
        }
    }
}

/// Orchestrator → queue calls
#[derive(Debug, Clone)]
pub struct HttpQueueClient {
    client: Client,
    timeout: Duration,
}

impl HttpQueueClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            timeout,
        }
    }
}

impl QueueClient for HttpQueueClient {
    fn register_processors(
        &self,
        queue: &WorkerEndpoint,
        processors: &[String],
    ) -> impl Future<Output = Result<(), ClientError>> + Send {
        let request = self
            .client
            .post(url(&queue.api, endpoints::PROCESSORS))
            .timeout(self.timeout)
            .json(&RegisterProcessorsRequest {
                processors: processors.to_vec(),
            });

        async move { send(request).await.map(|_| ()) }
    }

    fn submit_documents(
        &self,
        queue: &WorkerEndpoint,
        documents: &[DocumentRef],
    ) -> impl Future<Output = Result<(), ClientError>> + Send {
        let request = self
            .client
            .post(url(&queue.api, endpoints::DOCUMENTS))
            .timeout(self.timeout)
            .json(&SubmitDocumentsRequest {
                documents: documents.to_vec(),
            });

        async move { send(request).await.map(|_| ()) }
    }

    fn start_dispatch(
        &self,
        queue: &WorkerEndpoint,
    ) -> impl Future<Output = Result<(), ClientError>> + Send {
        let request = self
            .client
            .post(url(&queue.api, endpoints::DISPATCH))
            .timeout(self.timeout);

        async move { send(request).await.map(|_| ()) }
    }

    fn status(
        &self,
        queue: &WorkerEndpoint,
    ) -> impl Future<Output = Result<QueueStatus, ClientError>> + Send {
        let request = self
            .client
            .get(url(&queue.api, endpoints::STATUS))
            .timeout(self.timeout);

        send_json(request)
    }
}

/// Orchestrator → aggregator calls
#[derive(Debug, Clone)]
pub struct HttpAggregatorClient {
    client: Client,
    timeout: Duration,
}

impl HttpAggregatorClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            timeout,
        }
    }
}

impl AggregatorClient for HttpAggregatorClient {
    fn is_subscribed(
        &self,
        aggregator: &WorkerEndpoint,
    ) -> impl Future<Output = Result<bool, ClientError>> + Send {
        let request = self
            .client
            .get(url(&aggregator.api, endpoints::READY))
            .timeout(self.timeout);

        async move {
            let ready: ReadyResponse = send_json(request).await?;
            Ok(ready.ready)
        }
    }

    fn metrics(
        &self,
        aggregator: &WorkerEndpoint,
    ) -> impl Future<Output = Result<AggregatorSnapshot, ClientError>> + Send {
        let request = self
            .client
            .get(url(&aggregator.api, endpoints::METRICS))
            .timeout(self.timeout);

        send_json(request)
    }

    fn drain(
        &self,
        aggregator: &WorkerEndpoint,
    ) -> impl Future<Output = Result<AggregatorSnapshot, ClientError>> + Send {
        let request = self
            .client
            .post(url(&aggregator.api, endpoints::DRAIN))
            .timeout(self.timeout);

        send_json(request)
    }
}

//! YellowDog REST implementation of the platform clients.

mod error;
mod events;
mod http;
mod objects;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use reqwest::{Client, Method, Url};
use serde::Deserialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use crate::config::PlatformConfig;
use crate::platform::model::TransferProgress;
use crate::platform::{
    ComputeRequirementTemplate, ImageCatalog, ImageFamilySearch, ListenerId, MachineImageFamily,
    ObjectStore, PlatformApi, PlatformFuture, PoolProperties, Task, TemplateId, TemplateStore,
    TemplateUsage, TransferRequest, TransferSession, WorkClient, WorkListener, WorkRequirement,
    WorkerPool, WorkerPoolClient,
};
use http::{check_status, decode, endpoint, request};
use objects::TransferJob;

pub use error::YellowDogError;

/// Page envelope used by list endpoints.
#[derive(Debug, Deserialize)]
struct Page<T> {
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct Created {
    id: String,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct ProvisionRequest<'a> {
    requirement_template_usage: &'a TemplateUsage,
    provisioned_properties: &'a PoolProperties,
}

#[derive(serde::Serialize)]
struct AddTasks<'a> {
    tasks: &'a [Task],
}

/// Platform client speaking the YellowDog REST API.
#[derive(Clone)]
pub struct YellowDogClient {
    http: Client,
    base: Url,
    authorization: String,
    listeners: Arc<Mutex<HashMap<ListenerId, JoinHandle<()>>>>,
    next_listener: Arc<AtomicU64>,
}

impl std::fmt::Debug for YellowDogClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YellowDogClient")
            .field("base", &self.base.as_str())
            .finish_non_exhaustive()
    }
}

impl YellowDogClient {
    /// Constructs a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`YellowDogError::Config`] when the configuration fails
    /// validation and [`YellowDogError::InvalidUrl`] when the platform URL
    /// cannot host API paths.
    pub fn new(config: &PlatformConfig) -> Result<Self, YellowDogError> {
        config.validate()?;
        let base = Url::parse(&config.url).map_err(|err| YellowDogError::InvalidUrl {
            url: config.url.clone(),
            message: err.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(YellowDogError::InvalidUrl {
                url: config.url.clone(),
                message: String::from("URL cannot be a base"),
            });
        }
        let http = Client::builder()
            .user_agent(concat!("ydemo/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base,
            authorization: format!("yd-key {}:{}", config.key, config.secret),
            listeners: Arc::new(Mutex::new(HashMap::new())),
            next_listener: Arc::new(AtomicU64::new(1)),
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, YellowDogError> {
        endpoint(&self.base, segments)
    }

    async fn send_json<B: serde::Serialize + Sync>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<reqwest::Response, YellowDogError> {
        let mut builder = request(&self.http, method.clone(), url.clone(), &self.authorization)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(payload) = body {
            builder = builder.json(payload);
        }
        let sent = builder.send().await?;
        check_status(method, &url, sent).await
    }

    fn object_url(&self, transfer: &TransferRequest) -> Result<Url, YellowDogError> {
        self.url(&[
            "objectstore",
            "namespaces",
            transfer.namespace(),
            "objects",
            transfer.object_name(),
        ])
    }
}

impl PlatformApi for YellowDogClient {
    type Error = YellowDogError;
}

impl TemplateStore for YellowDogClient {
    fn create_template<'a>(
        &'a self,
        template: &'a ComputeRequirementTemplate,
    ) -> PlatformFuture<'a, TemplateId, Self::Error> {
        Box::pin(async move {
            let url = self.url(&["compute", "templates"])?;
            let response = self.send_json(Method::POST, url, Some(template)).await?;
            let created: Created = decode(response, "compute requirement template").await?;
            Ok(TemplateId::from(created.id))
        })
    }

    fn delete_template<'a>(&'a self, id: &'a TemplateId) -> PlatformFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let url = self.url(&["compute", "templates", id.as_str()])?;
            self.send_json::<()>(Method::DELETE, url, None).await?;
            Ok(())
        })
    }
}

impl ImageCatalog for YellowDogClient {
    fn search_image_families<'a>(
        &'a self,
        search: &'a ImageFamilySearch,
    ) -> PlatformFuture<'a, Vec<MachineImageFamily>, Self::Error> {
        Box::pin(async move {
            let mut url = self.url(&["images", "families"])?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("familyName", &search.family_name);
                query.append_pair("includePublic", &search.include_public.to_string());
                if let Some(namespace) = &search.namespace {
                    query.append_pair("namespace", namespace);
                }
            }
            let response = self.send_json::<()>(Method::GET, url, None).await?;
            let page: Page<MachineImageFamily> = decode(response, "image families").await?;
            Ok(page.items)
        })
    }
}

impl WorkerPoolClient for YellowDogClient {
    fn provision_worker_pool<'a>(
        &'a self,
        usage: &'a TemplateUsage,
        properties: &'a PoolProperties,
    ) -> PlatformFuture<'a, WorkerPool, Self::Error> {
        Box::pin(async move {
            let url = self.url(&["workerPools", "provisioned", "provision"])?;
            let body = ProvisionRequest {
                requirement_template_usage: usage,
                provisioned_properties: properties,
            };
            let response = self.send_json(Method::POST, url, Some(&body)).await?;
            decode(response, "worker pool").await
        })
    }
}

impl WorkClient for YellowDogClient {
    fn add_work_requirement<'a>(
        &'a self,
        requirement: &'a WorkRequirement,
    ) -> PlatformFuture<'a, WorkRequirement, Self::Error> {
        Box::pin(async move {
            let url = self.url(&["work", "requirements"])?;
            let response = self.send_json(Method::POST, url, Some(requirement)).await?;
            decode(response, "work requirement").await
        })
    }

    fn add_tasks<'a>(
        &'a self,
        namespace: &'a str,
        requirement_name: &'a str,
        task_group: &'a str,
        tasks: &'a [Task],
    ) -> PlatformFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let url = self.url(&[
                "work",
                "namespaces",
                namespace,
                "requirements",
                requirement_name,
                "taskGroups",
                task_group,
                "tasks",
            ])?;
            self.send_json(Method::POST, url, Some(&AddTasks { tasks }))
                .await?;
            Ok(())
        })
    }

    fn get_work_requirement<'a>(
        &'a self,
        id: &'a str,
    ) -> PlatformFuture<'a, WorkRequirement, Self::Error> {
        Box::pin(async move {
            let url = self.url(&["work", "requirements", id])?;
            let response = self.send_json::<()>(Method::GET, url, None).await?;
            decode(response, "work requirement").await
        })
    }

    fn add_work_requirement_listener<'a>(
        &'a self,
        id: &'a str,
        listener: WorkListener,
    ) -> PlatformFuture<'a, ListenerId, Self::Error> {
        Box::pin(async move {
            let url = self.url(&["work", "requirements", id, "updates"])?;
            let sent = request(&self.http, Method::GET, url.clone(), &self.authorization)
                .header(reqwest::header::ACCEPT, "text/event-stream")
                .send()
                .await?;
            let stream = check_status(Method::GET, &url, sent).await?;

            let listener_id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
            let handle = tokio::spawn(events::pump_updates(stream, listener));
            self.listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(listener_id, handle);
            debug!(requirement = id, listener = listener_id.0, "listening for updates");
            Ok(listener_id)
        })
    }

    fn remove_work_requirement_listener(
        &self,
        listener: ListenerId,
    ) -> PlatformFuture<'_, (), Self::Error> {
        Box::pin(async move {
            let handle = self
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&listener)
                .ok_or(YellowDogError::UnknownListener(listener.0))?;
            handle.abort();
            Ok(())
        })
    }
}

impl ObjectStore for YellowDogClient {
    fn start_transfer<'a>(
        &'a self,
        transfer: &'a TransferRequest,
    ) -> PlatformFuture<'a, TransferSession, Self::Error> {
        Box::pin(async move {
            let job = TransferJob {
                http: self.http.clone(),
                authorization: self.authorization.clone(),
                url: self.object_url(transfer)?,
                request: transfer.clone(),
            };
            let (sender, receiver) = watch::channel(TransferProgress::default());
            tokio::spawn(job.run(sender));
            Ok(TransferSession {
                id: Uuid::new_v4().simple().to_string(),
                progress: receiver,
            })
        })
    }
}

#[cfg(test)]
mod tests;

use reqwest::StatusCode;
use tracker_core::{ChunkStatusReport, FileHandle, ProcessingStatus, StageData, StageKind};
use tracker_logging::tracker_trace;
use url::Url;

use crate::wire;
use crate::{ApiError, ApiErrorKind, ClientSettings, RegenerateAck, StageApi};

/// [`StageApi`] over the backend's REST endpoints.
#[derive(Debug, Clone)]
pub struct ReqwestStageApi {
    base: Url,
    client: reqwest::Client,
}

impl ReqwestStageApi {
    pub fn new(settings: ClientSettings) -> Result<Self, ApiError> {
        let mut base = Url::parse(&settings.base_url)
            .map_err(|err| ApiError::new(ApiErrorKind::InvalidUrl, err.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::new(
                ApiErrorKind::InvalidUrl,
                format!("{} cannot be used as a base url", settings.base_url),
            ));
        }
        // Keep relative joins inside the configured prefix.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ApiError::network(err.to_string()))?;

        Ok(Self { base, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, file: &FileHandle, tail: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::new(ApiErrorKind::InvalidUrl, "base url has no path"))?
            .pop_if_empty()
            .push("files")
            .push(file.as_str())
            .extend(tail);
        Ok(url)
    }

    async fn read(&self, request: reqwest::RequestBuilder) -> Result<Vec<u8>, ApiError> {
        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        tracker_trace!("{} -> {}", response.url(), status);
        let body = response.bytes().await.map_err(map_reqwest_error)?;

        if status == StatusCode::NOT_FOUND {
            let message = wire::error_message(&body).unwrap_or_else(|| status.to_string());
            return Err(ApiError::not_found(message));
        }
        if !status.is_success() {
            let message = wire::error_message(&body).unwrap_or_else(|| status.to_string());
            return Err(ApiError::status(status.as_u16(), message));
        }
        Ok(body.to_vec())
    }
}

#[async_trait::async_trait]
impl StageApi for ReqwestStageApi {
    async fn stage_content(
        &self,
        file: &FileHandle,
        stage: StageKind,
        limit: u32,
        offset: u32,
    ) -> Result<StageData, ApiError> {
        let mut url = self.endpoint(file, &["stages", stage.as_str()])?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string())
            .append_pair("offset", &offset.to_string());
        let body = self.read(self.client.get(url)).await?;
        wire::parse_stage_content(stage, &body)
    }

    async fn regenerate(
        &self,
        file: &FileHandle,
        stage: StageKind,
    ) -> Result<RegenerateAck, ApiError> {
        let url = self.endpoint(file, &["stages", stage.as_str(), "regenerate"])?;
        let body = self.read(self.client.post(url)).await?;
        wire::parse_regenerate_ack(&body)
    }

    async fn processing_status(&self, file: &FileHandle) -> Result<ProcessingStatus, ApiError> {
        let url = self.endpoint(file, &["processing-status"])?;
        let body = self.read(self.client.get(url)).await?;
        wire::parse_processing_status(&body)
    }

    async fn chunk_status(
        &self,
        file: &FileHandle,
    ) -> Result<Option<ChunkStatusReport>, ApiError> {
        let url = self.endpoint(file, &["chunk-status"])?;
        match self.read(self.client.get(url)).await {
            Ok(body) => wire::parse_chunk_status(&body),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::new(ApiErrorKind::Timeout, err.to_string());
    }
    if err.is_decode() {
        return ApiError::new(ApiErrorKind::Decode, err.to_string());
    }
    ApiError::network(err.to_string())
}

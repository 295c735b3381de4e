use std::collections::HashMap;

use actix_multipart::Multipart;
use actix_web::http::header;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use futures::{StreamExt, TryStreamExt};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared::{
    aggregate, explain, export_file_name, export_rows, Analysis, AnalysisType, Comparison,
    ComparisonSummary, EngineError, PredictionRow, ResultRecord, RowFilter, Side,
    SortDirection, SortKey, SortSpec, ViewState,
};
use uuid::Uuid;

use crate::analysis::analysis_service::AnalysisService;
use crate::classifier::upload::UploadedFile;
use crate::config::{AppConfig, LimitsConfig};
use crate::error::ApiError;
use crate::store::analysis_store::{AnalysisStore, StoredAnalysis};

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/health").route(web::get().to(health)))
        .service(web::resource("/api/models").route(web::get().to(models)))
        .service(web::resource("/api/analyses/single").route(web::post().to(analyze_single)))
        .service(web::resource("/api/analyses/batch").route(web::post().to(analyze_batch)))
        .service(
            web::resource("/api/analyses/comparison").route(web::post().to(analyze_comparison)),
        )
        .service(web::resource("/api/analyses/current").route(web::get().to(current_analysis)))
        .service(web::resource("/api/analyses/{id}").route(web::get().to(get_analysis)))
        .service(web::resource("/api/analyses/{id}/select").route(web::post().to(select_analysis)))
        .service(web::resource("/api/analyses/{id}/rows").route(web::get().to(get_rows)))
        .service(
            web::resource("/api/analyses/{id}/rows/{row}/report")
                .route(web::get().to(get_row_report)),
        )
        .service(web::resource("/api/analyses/{id}/export").route(web::get().to(export_analysis)))
        .service(web::resource("/api/engine/aggregate").route(web::post().to(engine_aggregate)))
        .service(web::resource("/api/engine/compare").route(web::post().to(engine_compare)))
        .service(web::resource("/api/engine/export").route(web::post().to(engine_export)));
}

#[derive(Default)]
struct MultipartForm {
    files: Vec<(String, UploadedFile)>,
    fields: HashMap<String, String>,
}

impl MultipartForm {
    fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        let index = self.files.iter().position(|(field, _)| field == name)?;
        Some(self.files.remove(index).1)
    }

    fn model(&self, name: &str, config: &AppConfig) -> String {
        self.fields
            .get(name)
            .filter(|model| !model.is_empty())
            .cloned()
            .unwrap_or_else(|| config.classifier.default_model.clone())
    }
}

/// Collects form fields and file parts. Fails as soon as a file exceeds the
/// size limit or there are more files than a batch allows, before buffering
/// the rest of the request.
async fn read_multipart(
    mut payload: Multipart,
    limits: &LimitsConfig,
) -> Result<MultipartForm, ApiError> {
    let mut form = MultipartForm::default();

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart payload: {}", e)))?
    {
        let (name, filename) = match field.content_disposition() {
            Some(disposition) => (
                disposition.get_name().unwrap_or_default().to_string(),
                disposition.get_filename().map(str::to_string),
            ),
            None => continue,
        };
        if filename.is_some() && form.files.len() >= limits.max_batch_files {
            return Err(ApiError::BadRequest(format!(
                "At most {} files can be analyzed together",
                limits.max_batch_files
            )));
        }

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk
                .map_err(|e| ApiError::BadRequest(format!("Invalid multipart payload: {}", e)))?;
            if data.len() + chunk.len() > limits.max_file_bytes {
                return Err(ApiError::PayloadTooLarge(
                    filename.clone().unwrap_or_else(|| name.clone()),
                ));
            }
            data.extend_from_slice(&chunk);
        }

        match filename {
            Some(filename) if !data.is_empty() => {
                form.files.push((name, UploadedFile::new(filename, data)))
            }
            Some(filename) => info!("Skipping empty upload {}", filename),
            None => {
                form.fields
                    .insert(name, String::from_utf8_lossy(&data).trim().to_string());
            }
        }
    }

    Ok(form)
}

#[derive(Serialize)]
struct AnalysisResponse<'a> {
    #[serde(flatten)]
    stored: &'a StoredAnalysis,
    message: String,
}

fn analysis_message(analysis: &Analysis) -> String {
    match analysis {
        Analysis::Single { result } | Analysis::Batch { result, .. } => result.summary_message(),
        Analysis::Comparison { comparison } => {
            let delta = comparison.summary.confirmed_count_delta.magnitude;
            let total = comparison.summary.total_coverage;
            match comparison.higher_confirmed_rate_label() {
                Ok(label) => format!(
                    "Comparison complete: {} confirmed apart over {} predictions, {} has the higher confirmed rate.",
                    delta, total, label
                ),
                Err(e) => format!(
                    "Comparison complete: {} confirmed apart over {} predictions. {}",
                    delta, total, e
                ),
            }
        }
    }
}

fn analysis_json(stored: &StoredAnalysis) -> HttpResponse {
    HttpResponse::Ok().json(AnalysisResponse {
        stored,
        message: analysis_message(&stored.analysis),
    })
}

fn created_json(stored: &StoredAnalysis) -> HttpResponse {
    HttpResponse::Created().json(AnalysisResponse {
        stored,
        message: analysis_message(&stored.analysis),
    })
}

fn find_analysis(
    store: &web::Data<dyn AnalysisStore>,
    id: Uuid,
) -> Result<std::sync::Arc<StoredAnalysis>, ApiError> {
    store
        .get(id)
        .ok_or_else(|| ApiError::NotFound(format!("Analysis {} not found", id)))
}

fn side_record(stored: &StoredAnalysis, side: Option<Side>) -> Result<&ResultRecord, ApiError> {
    stored.analysis.record(side).ok_or_else(|| {
        ApiError::BadRequest("A comparison needs side=a or side=b".to_string())
    })
}

async fn health(service: web::Data<AnalysisService>) -> HttpResponse {
    let classifier_reachable = service.classifier().health().await;
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "classifier_reachable": classifier_reachable,
        "cached_results": service.cached_results().await,
    }))
}

async fn models(
    service: web::Data<AnalysisService>,
    config: web::Data<AppConfig>,
) -> HttpResponse {
    let classifier_models = match service.classifier().available_models().await {
        Ok(models) => Some(models),
        Err(e) => {
            log::warn!("Could not list classifier models: {}", e);
            None
        }
    };
    let models: Vec<_> = config
        .classifier
        .models
        .iter()
        .map(|(id, name)| json!({ "id": id, "name": name }))
        .collect();

    HttpResponse::Ok().json(json!({
        "default_model": config.classifier.default_model,
        "models": models,
        "classifier_models": classifier_models,
    }))
}

async fn analyze_single(
    payload: Multipart,
    service: web::Data<AnalysisService>,
    store: web::Data<dyn AnalysisStore>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, ApiError> {
    let mut form = read_multipart(payload, &config.limits).await?;
    let upload = form
        .take_file("file")
        .ok_or_else(|| ApiError::BadRequest("Missing file field 'file'".to_string()))?;
    let model_id = form.model("model_type", &config);

    let analysis = service.analyze(std::slice::from_ref(&upload), &model_id).await?;
    let stored = store.insert(analysis);
    Ok(created_json(&stored))
}

async fn analyze_batch(
    payload: Multipart,
    service: web::Data<AnalysisService>,
    store: web::Data<dyn AnalysisStore>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, ApiError> {
    let form = read_multipart(payload, &config.limits).await?;
    let model_id = form.model("model_type", &config);
    let uploads: Vec<UploadedFile> = form.files.into_iter().map(|(_, file)| file).collect();
    info!("Batch analysis of {} files with {}", uploads.len(), model_id);

    let analysis = service.analyze(&uploads, &model_id).await?;
    let stored = store.insert(analysis);
    Ok(created_json(&stored))
}

async fn analyze_comparison(
    payload: Multipart,
    service: web::Data<AnalysisService>,
    store: web::Data<dyn AnalysisStore>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, ApiError> {
    let mut form = read_multipart(payload, &config.limits).await?;
    let (first, second) = match (form.take_file("file1"), form.take_file("file2")) {
        (Some(first), Some(second)) => (first, second),
        _ => {
            return Err(ApiError::BadRequest(
                "A comparison needs exactly two files, 'file1' and 'file2'".to_string(),
            ));
        }
    };
    if !form.files.is_empty() {
        return Err(ApiError::BadRequest(
            "A comparison takes exactly two files".to_string(),
        ));
    }
    let model1 = form.model("model1", &config);
    let model2 = form.model("model2", &config);

    let analysis = service
        .compare((&first, model1.as_str()), (&second, model2.as_str()))
        .await?;
    let stored = store.insert(analysis);
    Ok(created_json(&stored))
}

async fn current_analysis(store: web::Data<dyn AnalysisStore>) -> Result<HttpResponse, ApiError> {
    let stored = store
        .current()
        .ok_or_else(|| ApiError::NotFound("No analysis yet".to_string()))?;
    Ok(analysis_json(&stored))
}

async fn get_analysis(
    path: web::Path<Uuid>,
    store: web::Data<dyn AnalysisStore>,
) -> Result<HttpResponse, ApiError> {
    let stored = find_analysis(&store, path.into_inner())?;
    Ok(analysis_json(&stored))
}

async fn select_analysis(
    path: web::Path<Uuid>,
    store: web::Data<dyn AnalysisStore>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    if !store.set_current(id) {
        return Err(ApiError::NotFound(format!("Analysis {} not found", id)));
    }
    let stored = find_analysis(&store, id)?;
    Ok(analysis_json(&stored))
}

#[derive(Deserialize)]
struct RowsQuery {
    #[serde(default)]
    filter: RowFilter,
    #[serde(default)]
    sort: SortKey,
    #[serde(default)]
    direction: SortDirection,
    side: Option<Side>,
}

#[derive(Deserialize)]
struct SideQuery {
    side: Option<Side>,
}

#[derive(Serialize)]
struct RowView<'a> {
    #[serde(flatten)]
    row: &'a PredictionRow,
    label: String,
    color: &'static str,
}

#[derive(Serialize)]
struct RowsResponse<'a> {
    analysis_id: Uuid,
    filter: RowFilter,
    sort: SortSpec,
    total_rows: usize,
    rows: Vec<RowView<'a>>,
}

async fn get_rows(
    path: web::Path<Uuid>,
    query: web::Query<RowsQuery>,
    store: web::Data<dyn AnalysisStore>,
) -> Result<HttpResponse, ApiError> {
    let stored = find_analysis(&store, path.into_inner())?;
    let record = side_record(&stored, query.side)?;
    let view = ViewState {
        filter: query.filter,
        sort: SortSpec::new(query.sort, query.direction),
    };

    let rows = view
        .apply(record)
        .into_iter()
        .map(|row| RowView {
            row,
            label: row.prediction.display_label(),
            color: row.prediction.color(),
        })
        .collect();

    Ok(HttpResponse::Ok().json(RowsResponse {
        analysis_id: stored.id,
        filter: view.filter,
        sort: view.sort,
        total_rows: record.predictions.len(),
        rows,
    }))
}

async fn get_row_report(
    path: web::Path<(Uuid, String)>,
    query: web::Query<SideQuery>,
    store: web::Data<dyn AnalysisStore>,
) -> Result<HttpResponse, ApiError> {
    let (id, row_id) = path.into_inner();
    let stored = find_analysis(&store, id)?;
    let record = side_record(&stored, query.side)?;
    let row = record
        .find_row(&row_id)
        .ok_or_else(|| ApiError::NotFound(format!("Row {} not found", row_id)))?;

    Ok(HttpResponse::Ok().json(json!({
        "row": row,
        "report": explain(row),
    })))
}

/// Attachment header for a download name that may carry caller-supplied text.
/// Control characters are replaced; non-ASCII names also get a UTF-8 `filename*`.
fn attachment(file_name: &str) -> header::ContentDisposition {
    let fallback: String = file_name
        .chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '_' })
        .collect();
    let mut parameters = vec![header::DispositionParam::Filename(fallback)];
    if !file_name.is_ascii() {
        parameters.push(header::DispositionParam::FilenameExt(header::ExtendedValue {
            charset: header::Charset::Ext("UTF-8".to_string()),
            language_tag: None,
            value: file_name.as_bytes().to_vec(),
        }));
    }
    header::ContentDisposition {
        disposition: header::DispositionType::Attachment,
        parameters,
    }
}

fn csv_attachment(csv: String, file_name: &str) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header(attachment(file_name))
        .body(csv)
}

async fn export_analysis(
    path: web::Path<Uuid>,
    query: web::Query<SideQuery>,
    store: web::Data<dyn AnalysisStore>,
) -> Result<HttpResponse, ApiError> {
    let stored = find_analysis(&store, path.into_inner())?;
    let record = side_record(&stored, query.side)?;
    let csv = export_rows(record)?;
    let file_name = export_file_name(
        stored.analysis.analysis_type(),
        &record.model_used,
        Utc::now().date_naive(),
    );
    info!("Exporting {} rows as {}", record.predictions.len(), file_name);
    Ok(csv_attachment(csv, &file_name))
}

/// Parses a payload, prefixing any missing field with where it came from.
fn parse_record(value: serde_json::Value, position: &str) -> Result<ResultRecord, ApiError> {
    ResultRecord::from_json(value).map_err(|e| match e {
        EngineError::MalformedRecord { field } => {
            EngineError::malformed(format!("{}: {}", position, field)).into()
        }
        other => other.into(),
    })
}

#[derive(Deserialize)]
struct AggregateRequest {
    records: Vec<serde_json::Value>,
    model_override: Option<String>,
}

async fn engine_aggregate(req: web::Json<AggregateRequest>) -> Result<HttpResponse, ApiError> {
    let req = req.into_inner();
    let records = req
        .records
        .into_iter()
        .enumerate()
        .map(|(i, value)| parse_record(value, &format!("records[{}]", i)))
        .collect::<Result<Vec<_>, _>>()?;
    let merged = aggregate(&records, req.model_override.as_deref())?;
    Ok(HttpResponse::Ok().json(merged))
}

#[derive(Deserialize)]
struct CompareRequest {
    a: serde_json::Value,
    b: serde_json::Value,
    label_a: Option<String>,
    label_b: Option<String>,
    /// Fail instead of answering without a higher-rate side.
    #[serde(default)]
    require_insight: bool,
}

#[derive(Serialize)]
struct CompareResponse<'a> {
    label_a: &'a str,
    label_b: &'a str,
    summary: ComparisonSummary,
    higher_confirmed_rate_label: Option<&'a str>,
}

async fn engine_compare(req: web::Json<CompareRequest>) -> Result<HttpResponse, ApiError> {
    let req = req.into_inner();
    let a = parse_record(req.a, "a")?;
    let b = parse_record(req.b, "b")?;
    let comparison = Comparison::new(a, req.label_a, b, req.label_b);

    let higher = match comparison.higher_confirmed_rate_label() {
        Ok(label) => Some(label),
        Err(e) if req.require_insight => return Err(e.into()),
        Err(_) => None,
    };

    Ok(HttpResponse::Ok().json(CompareResponse {
        label_a: &comparison.a.label,
        label_b: &comparison.b.label,
        summary: comparison.summary,
        higher_confirmed_rate_label: higher,
    }))
}

#[derive(Deserialize)]
struct ExportRequest {
    record: serde_json::Value,
    analysis_type: Option<AnalysisType>,
}

async fn engine_export(req: web::Json<ExportRequest>) -> Result<HttpResponse, ApiError> {
    let req = req.into_inner();
    let record = parse_record(req.record, "record")?;
    let csv = export_rows(&record)?;
    let file_name = export_file_name(
        req.analysis_type.unwrap_or(AnalysisType::Single),
        &record.model_used,
        Utc::now().date_naive(),
    );
    Ok(csv_attachment(csv, &file_name))
}

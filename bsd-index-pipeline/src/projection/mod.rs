//! Typed registry of per-document-type loading and projection.
//!
//! Every [`DocumentType`] maps to a [`DocumentSpec`]: the relations to
//! eager-load with the record and the function turning the loaded record
//! into a [`BsdDocument`]. The match in [`document_spec`] is exhaustive, so adding a
//! document type without its projection does not compile.

use bsd_index_shared::{BsdDocument, BsdRecord, DocumentType};
use serde_json::Value;

use crate::errors::PipelineError;

/// How a document type is loaded and projected.
pub struct DocumentSpec {
    /// Relations eager-loaded with each record.
    pub relations: &'static [&'static str],
    /// Projection of a loaded record into its search document.
    pub project: fn(&BsdRecord) -> Result<BsdDocument, PipelineError>,
}

/// How `document_type` is loaded and projected.
pub fn document_spec(document_type: DocumentType) -> &'static DocumentSpec {
    match document_type {
        DocumentType::Bsdd => &BSDD,
        DocumentType::Bsda => &BSDA,
        DocumentType::Bsdasri => &BSDASRI,
        DocumentType::Bsff => &BSFF,
        DocumentType::Bsvhu => &BSVHU,
        DocumentType::Bspaoh => &BSPAOH,
    }
}

static BSDD: DocumentSpec = DocumentSpec {
    relations: &["transporters", "forwardedIn", "intermediaries", "grouping"],
    project: project_bsdd,
};

static BSDA: DocumentSpec = DocumentSpec {
    relations: &["transporters", "intermediaries", "grouping", "forwarding"],
    project: project_bsda,
};

static BSDASRI: DocumentSpec = DocumentSpec {
    relations: &["grouping", "synthesizing"],
    project: project_bsdasri,
};

static BSFF: DocumentSpec = DocumentSpec {
    relations: &["transporters", "packagings", "ficheInterventions"],
    project: project_bsff,
};

static BSVHU: DocumentSpec = DocumentSpec {
    relations: &["intermediaries"],
    project: project_bsvhu,
};

static BSPAOH: DocumentSpec = DocumentSpec {
    relations: &["transporters"],
    project: project_bspaoh,
};

/// Where a draft is recorded.
enum DraftMarker {
    /// `isDraft` column.
    Flag,
    /// `status == "DRAFT"`.
    Status,
}

/// Column layout shared by the projections.
struct Layout {
    document_type: DocumentType,
    readable_id: Option<&'static str>,
    waste_code: &'static str,
    draft: DraftMarker,
    sirets: &'static [&'static str],
    /// Relation holding a transporter list, each with `transporterCompanySiret`.
    transporters: Option<&'static str>,
}

fn project_bsdd(record: &BsdRecord) -> Result<BsdDocument, PipelineError> {
    project_with(
        record,
        &Layout {
            document_type: DocumentType::Bsdd,
            readable_id: Some("readableId"),
            waste_code: "wasteDetailsCode",
            draft: DraftMarker::Status,
            sirets: &[
                "emitterCompanySiret",
                "recipientCompanySiret",
                "traderCompanySiret",
                "brokerCompanySiret",
                "ecoOrganismeSiret",
            ],
            transporters: Some("transporters"),
        },
    )
}

fn project_bsda(record: &BsdRecord) -> Result<BsdDocument, PipelineError> {
    project_with(
        record,
        &Layout {
            document_type: DocumentType::Bsda,
            readable_id: None,
            waste_code: "wasteCode",
            draft: DraftMarker::Flag,
            sirets: &[
                "emitterCompanySiret",
                "destinationCompanySiret",
                "workerCompanySiret",
                "brokerCompanySiret",
                "ecoOrganismeSiret",
            ],
            transporters: Some("transporters"),
        },
    )
}

fn project_bsdasri(record: &BsdRecord) -> Result<BsdDocument, PipelineError> {
    project_with(
        record,
        &Layout {
            document_type: DocumentType::Bsdasri,
            readable_id: None,
            waste_code: "wasteCode",
            draft: DraftMarker::Flag,
            sirets: &[
                "emitterCompanySiret",
                "transporterCompanySiret",
                "destinationCompanySiret",
                "ecoOrganismeSiret",
            ],
            transporters: None,
        },
    )
}

fn project_bsff(record: &BsdRecord) -> Result<BsdDocument, PipelineError> {
    project_with(
        record,
        &Layout {
            document_type: DocumentType::Bsff,
            readable_id: None,
            waste_code: "wasteCode",
            draft: DraftMarker::Flag,
            sirets: &["emitterCompanySiret", "destinationCompanySiret"],
            transporters: Some("transporters"),
        },
    )
}

fn project_bsvhu(record: &BsdRecord) -> Result<BsdDocument, PipelineError> {
    project_with(
        record,
        &Layout {
            document_type: DocumentType::Bsvhu,
            readable_id: None,
            waste_code: "wasteCode",
            draft: DraftMarker::Flag,
            sirets: &[
                "emitterCompanySiret",
                "transporterCompanySiret",
                "destinationCompanySiret",
            ],
            transporters: None,
        },
    )
}

fn project_bspaoh(record: &BsdRecord) -> Result<BsdDocument, PipelineError> {
    project_with(
        record,
        &Layout {
            document_type: DocumentType::Bspaoh,
            readable_id: None,
            waste_code: "wasteCode",
            draft: DraftMarker::Status,
            sirets: &["emitterCompanySiret", "destinationCompanySiret"],
            transporters: Some("transporters"),
        },
    )
}

fn project_with(record: &BsdRecord, layout: &Layout) -> Result<BsdDocument, PipelineError> {
    if record.document_type != layout.document_type {
        return Err(PipelineError::projection(format!(
            "record {} is a {}, expected {}",
            record.id, record.document_type, layout.document_type
        )));
    }

    let status = record
        .str_field("status")
        .ok_or_else(|| PipelineError::projection(format!("record {} has no status", record.id)))?;

    let readable_id = match layout.readable_id {
        Some(field) => record.str_field(field).ok_or_else(|| {
            PipelineError::projection(format!("record {} has no {}", record.id, field))
        })?,
        None => record.id.as_str(),
    };

    let is_draft = match layout.draft {
        DraftMarker::Flag => record.bool_field("isDraft"),
        DraftMarker::Status => status == "DRAFT",
    };

    let mut sirets: Vec<String> = layout
        .sirets
        .iter()
        .filter_map(|field| record.str_field(field))
        .map(str::to_string)
        .collect();

    if let Some(relation) = layout.transporters {
        let transporters = record
            .data
            .get(relation)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        sirets.extend(
            transporters
                .iter()
                .filter_map(|t| t.get("transporterCompanySiret").and_then(Value::as_str))
                .map(str::to_string),
        );
    }

    sirets.retain(|siret| !siret.is_empty());
    sirets.sort();
    sirets.dedup();

    Ok(BsdDocument {
        id: record.id.clone(),
        document_type: record.document_type,
        readable_id: readable_id.to_string(),
        status: status.to_string(),
        is_draft,
        waste_code: record.str_field(layout.waste_code).map(str::to_string),
        sirets,
        created_at: record.created_at,
        updated_at: record.updated_at,
    })
}

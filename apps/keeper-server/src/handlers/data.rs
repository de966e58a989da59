//! Record handlers: create, get all, update, delete
//!
//! Binary records keep their bytes in the object store. The relational row
//! holds an empty content column plus the object location under
//! `metadata["file_url"]`, which only the server ever writes.

use std::collections::HashMap;
use tonic::{Request, Response, Status};

use keeper_proto::convert::{
    kind_from_wire, kind_to_wire, metadata_from_wire, metadata_to_wire, to_micros,
};
use keeper_proto::{
    CreateDataRequest, CreateDataResponse, DataItem, DeleteDataRequest, DeleteDataResponse,
    GetAllDataRequest, GetAllDataResponse, UpdateDataRequest, UpdateDataResponse,
};
use keeper_storage::{
    check_metadata, DataId, DataRow, DataUpdate, Metadata, MetadataValue, NewData, ObjectError,
    ObjectKey, UserId, FILE_URL_KEY,
};

use crate::server::{record_status, KeeperServer};

fn checked_metadata(wire: HashMap<String, keeper_proto::MetadataValue>) -> Result<Metadata, Status> {
    let metadata = metadata_from_wire(wire);
    check_metadata(&metadata)
        .map_err(|e| Status::invalid_argument(format!("Invalid metadata: {}", e)))?;
    Ok(metadata)
}

/// Object location recorded for a Binary row.
fn stored_location(row: &DataRow) -> Result<ObjectKey, Status> {
    row.metadata
        .get(FILE_URL_KEY)
        .and_then(MetadataValue::as_str)
        .and_then(ObjectKey::parse)
        .ok_or_else(|| Status::internal(format!("Data {} has no valid file location", row.id)))
}

pub async fn create_data(
    server: &KeeperServer,
    request: Request<CreateDataRequest>,
) -> Result<Response<CreateDataResponse>, Status> {
    let owner = server.owner(&request).await?;
    let req = request.into_inner();

    let kind = kind_from_wire(req.data_type)
        .ok_or_else(|| Status::invalid_argument("Unknown or unspecified data type"))?;
    let mut metadata = checked_metadata(req.metadata)?;

    let mut uploaded = None;
    let (content, file_name) = if kind.is_binary() {
        if req.file_name.trim().is_empty() {
            return Err(Status::invalid_argument("Binary data requires a file name"));
        }
        let key = ObjectKey::for_upload(&owner, &req.file_name);
        server
            .objects
            .put(&key, &req.content)
            .await
            .map_err(|e| Status::internal(format!("Failed to upload file: {}", e)))?;
        metadata.insert(FILE_URL_KEY.to_string(), key.as_str().into());
        let file_name = key.file_name().to_string();
        uploaded = Some(key);
        (Vec::new(), Some(file_name))
    } else {
        (req.content, None)
    };

    let row = match server
        .store
        .create_data(
            &owner,
            &NewData {
                kind,
                content,
                metadata,
                file_name,
            },
        )
        .await
    {
        Ok(row) => row,
        Err(e) => {
            if let Some(key) = uploaded {
                if let Err(cleanup) = server.objects.delete(&key).await {
                    tracing::warn!(
                        owner = %owner,
                        key = %key,
                        error = %cleanup,
                        "failed to remove orphaned upload"
                    );
                }
            }
            return Err(record_status(e, "create data"));
        }
    };

    tracing::debug!(owner = %owner, id = %row.id, kind = %kind, "created data");
    Ok(Response::new(CreateDataResponse {
        data_id: row.id.0,
        message: "Data created".to_string(),
        updated_at: to_micros(row.updated_at),
    }))
}

pub async fn get_all_data(
    server: &KeeperServer,
    request: Request<GetAllDataRequest>,
) -> Result<Response<GetAllDataResponse>, Status> {
    let owner = server.owner(&request).await?;

    let rows = server
        .store
        .list_data(&owner)
        .await
        .map_err(|e| Status::internal(format!("Failed to list data: {}", e)))?;
    if rows.is_empty() {
        return Err(Status::not_found("No data found"));
    }

    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        let content = if row.kind.is_binary() {
            let key = stored_location(&row)?;
            server.objects.get(&key).await.map_err(|e| {
                Status::internal(format!("Failed to load file for data {}: {}", row.id, e))
            })?
        } else {
            row.content
        };
        items.push(DataItem {
            data_id: row.id.0,
            data_type: kind_to_wire(row.kind),
            content,
            metadata: metadata_to_wire(&row.metadata),
            updated_at: to_micros(row.updated_at),
            created_at: to_micros(row.created_at),
            file_name: row.file_name.unwrap_or_default(),
        });
    }

    Ok(Response::new(GetAllDataResponse { items }))
}

/// Put back the object a rename removed. A row left pointing at nothing is
/// logged, since every later GetAllData for the owner fails on it.
async fn restore_previous(
    server: &KeeperServer,
    owner: &UserId,
    id: &DataId,
    replaced: Option<(ObjectKey, Option<Vec<u8>>)>,
) {
    let Some((key, previous)) = replaced else {
        return;
    };
    let restored = match previous {
        Some(bytes) => server.objects.put(&key, &bytes).await.is_ok(),
        None => false,
    };
    if !restored {
        tracing::error!(owner = %owner, id = %id, key = %key, "record points at a removed file");
    }
}

pub async fn update_data(
    server: &KeeperServer,
    request: Request<UpdateDataRequest>,
) -> Result<Response<UpdateDataResponse>, Status> {
    let owner = server.owner(&request).await?;
    let req = request.into_inner();
    let id = DataId(req.data_id);

    let existing = server
        .store
        .get_data(&owner, &id)
        .await
        .map_err(|e| record_status(e, "get data"))?;
    let mut metadata = checked_metadata(req.metadata)?;

    // A rename removes the old object first; keep its bytes so a failed
    // update can put it back.
    let mut replaced: Option<(ObjectKey, Option<Vec<u8>>)> = None;
    let mut renamed_to: Option<ObjectKey> = None;

    let (content, file_name) = if existing.kind.is_binary() {
        let current = stored_location(&existing)?;
        let name = if req.file_name.trim().is_empty() {
            current.file_name()
        } else {
            req.file_name.as_str()
        };
        let target = current.with_file_name(&owner, name);

        if target != current {
            let previous = server.objects.get(&current).await.ok();
            match server.objects.delete(&current).await {
                Ok(()) | Err(ObjectError::NotFound(_)) => {}
                Err(e) => {
                    return Err(Status::internal(format!(
                        "Failed to remove previous file: {}",
                        e
                    )))
                }
            }
            replaced = Some((current.clone(), previous));
            renamed_to = Some(target.clone());
        }
        if let Err(e) = server.objects.put(&target, &req.content).await {
            restore_previous(server, &owner, &id, replaced).await;
            return Err(Status::internal(format!("Failed to upload file: {}", e)));
        }

        metadata.insert(FILE_URL_KEY.to_string(), target.as_str().into());
        (Vec::new(), Some(target.file_name().to_string()))
    } else {
        (req.content, None)
    };

    let update = DataUpdate {
        content,
        metadata,
        file_name,
    };
    let updated_at = match server.store.update_data(&owner, &id, &update).await {
        Ok(at) => at,
        Err(e) => {
            if let Some(key) = &renamed_to {
                if let Err(cleanup) = server.objects.delete(key).await {
                    tracing::warn!(
                        key = %key,
                        error = %cleanup,
                        "failed to remove upload after failed update"
                    );
                }
            }
            restore_previous(server, &owner, &id, replaced).await;
            return Err(record_status(e, "update data"));
        }
    };

    tracing::debug!(owner = %owner, id = %id, "updated data");
    Ok(Response::new(UpdateDataResponse {
        message: "Data updated".to_string(),
        updated_at: to_micros(updated_at),
    }))
}

pub async fn delete_data(
    server: &KeeperServer,
    request: Request<DeleteDataRequest>,
) -> Result<Response<DeleteDataResponse>, Status> {
    let owner = server.owner(&request).await?;
    let id = DataId(request.get_ref().data_id);

    let existing = server
        .store
        .get_data(&owner, &id)
        .await
        .map_err(|e| record_status(e, "get data"))?;

    // The row goes only after its object is gone.
    if existing.kind.is_binary() {
        let key = stored_location(&existing)?;
        match server.objects.delete(&key).await {
            Ok(()) => {}
            Err(ObjectError::NotFound(_)) => {
                tracing::warn!(owner = %owner, id = %id, key = %key, "file already missing");
            }
            Err(e) => {
                return Err(Status::internal(format!(
                    "Failed to delete file for data {}: {}",
                    id, e
                )))
            }
        }
    }

    server
        .store
        .delete_data(&owner, &id)
        .await
        .map_err(|e| record_status(e, "delete data"))?;

    tracing::debug!(owner = %owner, id = %id, "deleted data");
    Ok(Response::new(DeleteDataResponse {
        message: "Data deleted".to_string(),
    }))
}

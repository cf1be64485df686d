//! Persistence layer for the course content store

use crate::error::StorageError;
use crate::store::{
    ChildPayload, ChildRow, CourseCatalog, CourseRecord, Draft, DraftStore, NewChild,
    OrderedChildStore,
};
use crate::types::{ChildId, ContainerKind, ContainerRef};
use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};
use sled::{Db, Tree};
use std::collections::HashSet;
use std::io;
use std::path::Path;

const TREE_COURSES: &str = "courses";
const TREE_ROWS: &str = "child_rows";
const TREE_POSITIONS: &str = "child_positions";
const TREE_DRAFTS: &str = "drafts";

/// Sled-based implementation of the ordered child and draft stores.
///
/// `child_positions` maps `container prefix + encoded position` to a child id and is
/// the uniqueness index; every mutation touches it and `child_rows` in one transaction.
#[derive(Clone)]
pub struct SledCourseStore {
    db: Db,
    courses: Tree,
    rows: Tree,
    positions: Tree,
    drafts: Tree,
}

impl SledCourseStore {
    /// Open (or create) a store at the given directory.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path).map_err(|e| {
            StorageError::IoError(io::Error::new(
                io::ErrorKind::Other,
                format!("Failed to open sled database: {}", e),
            ))
        })?;
        Self::from_db(db)
    }

    pub fn from_db(db: Db) -> Result<Self, StorageError> {
        let courses = db.open_tree(TREE_COURSES).map_err(to_storage_io)?;
        let rows = db.open_tree(TREE_ROWS).map_err(to_storage_io)?;
        let positions = db.open_tree(TREE_POSITIONS).map_err(to_storage_io)?;
        let drafts = db.open_tree(TREE_DRAFTS).map_err(to_storage_io)?;
        Ok(Self {
            db,
            courses,
            rows,
            positions,
            drafts,
        })
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush().map_err(to_storage_io)?;
        Ok(())
    }
}

impl CourseCatalog for SledCourseStore {
    fn create_course(&self, title: &str) -> Result<ContainerRef, StorageError> {
        let id = self.db.generate_id().map_err(to_storage_io)?;
        let record = CourseRecord {
            id,
            title: title.to_string(),
        };
        let value = bincode::serialize(&record).map_err(to_storage_codec)?;
        self.courses
            .insert(id.to_be_bytes(), value)
            .map_err(to_storage_io)?;
        Ok(ContainerRef::course(id))
    }

    fn list_courses(&self) -> Result<Vec<CourseRecord>, StorageError> {
        let mut out = Vec::new();
        for item in self.courses.iter() {
            let (_, value) = item.map_err(to_storage_io)?;
            out.push(bincode::deserialize(&value).map_err(to_storage_codec)?);
        }
        Ok(out)
    }
}

impl OrderedChildStore for SledCourseStore {
    fn select_children(&self, container: &ContainerRef) -> Result<Vec<ChildRow>, StorageError> {
        let mut out = Vec::new();
        for item in self.positions.scan_prefix(container.key_prefix()) {
            let (_, id_bytes) = item.map_err(to_storage_io)?;
            let id = decode_id(&id_bytes)?;
            // Index entries always point at an existing row; both are written together.
            if let Some(row) = self.get_child(id)? {
                out.push(row);
            }
        }
        Ok(out)
    }

    fn get_child(&self, id: ChildId) -> Result<Option<ChildRow>, StorageError> {
        match self.rows.get(id.to_be_bytes()).map_err(to_storage_io)? {
            Some(raw) => Ok(Some(decode_row(&raw)?)),
            None => Ok(None),
        }
    }

    fn update_position(
        &self,
        container: &ContainerRef,
        id: ChildId,
        position: i64,
    ) -> Result<(), StorageError> {
        let container = *container;
        let new_key = position_key(&container, position);

        let result = (&self.rows, &self.positions).transaction(|(rows, positions)| {
            let raw = rows
                .get(id.to_be_bytes())?
                .ok_or(ConflictableTransactionError::Abort(StorageError::ChildNotFound(id)))?;
            let mut row = decode_row(&raw).map_err(ConflictableTransactionError::Abort)?;
            if row.container != container {
                return Err(ConflictableTransactionError::Abort(
                    StorageError::ChildNotFound(id),
                ));
            }
            if row.position == position {
                return Ok(());
            }
            if positions.get(&new_key)?.is_some() {
                return Err(ConflictableTransactionError::Abort(
                    StorageError::PositionConflict {
                        container,
                        position,
                    },
                ));
            }

            positions.remove(position_key(&container, row.position))?;
            positions.insert(new_key.clone(), &id.to_be_bytes()[..])?;
            row.position = position;
            let encoded = encode_row(&row).map_err(ConflictableTransactionError::Abort)?;
            rows.insert(&id.to_be_bytes()[..], encoded)?;
            Ok(())
        });

        result.map_err(from_transaction_error)
    }

    fn insert_children(
        &self,
        container: &ContainerRef,
        children: Vec<NewChild>,
    ) -> Result<Vec<ChildId>, StorageError> {
        if !self.container_exists(container)? {
            return Err(StorageError::ContainerNotFound(*container));
        }

        let mut seen = HashSet::new();
        let mut prepared = Vec::with_capacity(children.len());
        for child in children {
            if !seen.insert(child.position) {
                return Err(StorageError::PositionConflict {
                    container: *container,
                    position: child.position,
                });
            }
            let id = self.db.generate_id().map_err(to_storage_io)?;
            let row = ChildRow {
                id,
                container: *container,
                position: child.position,
                payload: child.payload,
            };
            prepared.push((id, position_key(container, row.position), encode_row(&row)?));
        }

        let container = *container;
        let result = (&self.rows, &self.positions).transaction(|(rows, positions)| {
            for (id, key, encoded) in &prepared {
                if positions.get(key)?.is_some() {
                    let position = decode_position(key);
                    return Err(ConflictableTransactionError::Abort(
                        StorageError::PositionConflict {
                            container,
                            position,
                        },
                    ));
                }
                positions.insert(key.clone(), &id.to_be_bytes()[..])?;
                rows.insert(&id.to_be_bytes()[..], encoded.clone())?;
            }
            Ok(())
        });
        result.map_err(from_transaction_error)?;

        Ok(prepared.into_iter().map(|(id, _, _)| id).collect())
    }

    fn container_exists(&self, container: &ContainerRef) -> Result<bool, StorageError> {
        match container.kind {
            ContainerKind::Course => self
                .courses
                .contains_key(container.id.to_be_bytes())
                .map_err(to_storage_io),
            ContainerKind::Lesson => Ok(matches!(
                self.get_child(container.id)?,
                Some(ChildRow {
                    payload: ChildPayload::Lesson(_),
                    ..
                })
            )),
        }
    }
}

impl DraftStore for SledCourseStore {
    fn put_draft(&self, draft: &Draft) -> Result<(), StorageError> {
        let value = serde_json::to_vec(draft).map_err(to_storage_data)?;
        self.drafts
            .compare_and_swap(draft.draft_id.as_bytes(), None::<&[u8]>, Some(value))
            .map_err(to_storage_io)?
            .map_err(|_| StorageError::DraftExists(draft.draft_id.clone()))
    }

    fn get_draft(&self, draft_id: &str) -> Result<Option<Draft>, StorageError> {
        let Some(raw) = self.drafts.get(draft_id.as_bytes()).map_err(to_storage_io)? else {
            return Ok(None);
        };
        let parsed = serde_json::from_slice(&raw).map_err(to_storage_data)?;
        Ok(Some(parsed))
    }

    fn delete_draft(&self, draft_id: &str) -> Result<bool, StorageError> {
        let removed = self
            .drafts
            .remove(draft_id.as_bytes())
            .map_err(to_storage_io)?;
        Ok(removed.is_some())
    }

    fn list_drafts(&self, owner: &str) -> Result<Vec<Draft>, StorageError> {
        let mut out = Vec::new();
        for item in self.drafts.iter() {
            let (_, value) = item.map_err(to_storage_io)?;
            let draft: Draft = serde_json::from_slice(&value).map_err(to_storage_data)?;
            if draft.owner == owner {
                out.push(draft);
            }
        }
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(out)
    }
}

/// Order-preserving key: container prefix followed by the sign-flipped big-endian position.
fn position_key(container: &ContainerRef, position: i64) -> Vec<u8> {
    let mut key = Vec::with_capacity(17);
    key.extend_from_slice(&container.key_prefix());
    key.extend_from_slice(&((position as u64) ^ (1 << 63)).to_be_bytes());
    key
}

fn decode_position(key: &[u8]) -> i64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&key[key.len() - 8..]);
    (u64::from_be_bytes(buf) ^ (1 << 63)) as i64
}

fn decode_id(raw: &[u8]) -> Result<ChildId, StorageError> {
    let bytes: [u8; 8] = raw.try_into().map_err(|_| {
        StorageError::IoError(io::Error::new(
            io::ErrorKind::InvalidData,
            "Malformed child id in position index",
        ))
    })?;
    Ok(u64::from_be_bytes(bytes))
}

fn encode_row(row: &ChildRow) -> Result<Vec<u8>, StorageError> {
    bincode::serialize(row).map_err(to_storage_codec)
}

fn decode_row(raw: &[u8]) -> Result<ChildRow, StorageError> {
    bincode::deserialize(raw).map_err(to_storage_codec)
}

fn from_transaction_error(err: TransactionError<StorageError>) -> StorageError {
    match err {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => to_storage_io(e),
    }
}

fn to_storage_io(err: sled::Error) -> StorageError {
    StorageError::IoError(io::Error::new(io::ErrorKind::Other, err.to_string()))
}

fn to_storage_data(err: serde_json::Error) -> StorageError {
    StorageError::IoError(io::Error::new(io::ErrorKind::InvalidData, err.to_string()))
}

fn to_storage_codec(err: bincode::Error) -> StorageError {
    StorageError::IoError(io::Error::new(io::ErrorKind::InvalidData, err.to_string()))
}

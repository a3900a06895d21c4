use thiserror::Error;

#[derive(Debug, Error)]
pub enum OfficeError {
    #[error("Complete all fields.")]
    CompleteAllFields,
    #[error("Username already exists.")]
    UsernameExists,
    #[error("Invalid username or password.")]
    InvalidCredentials,
    #[error("Not signed in.")]
    NotAuthenticated,
    #[error("Administrator access required.")]
    NotAuthorized,
    #[error("Item not found.")]
    ItemNotFound,
    #[error("Quantity must be greater than zero.")]
    InvalidQty,
    #[error("Not enough stock for {name} (available: {available}).")]
    NotEnoughStock { name: String, available: i64 },
    #[error("Nothing to return.")]
    NothingToReturn,
    #[error("Cannot return more than borrowed for {name} (borrowed: {borrowed}).")]
    ReturnTooMuch { name: String, borrowed: i64 },
    #[error("Request is incomplete.")]
    InvalidRequest,
    #[error("Request not found.")]
    RequestNotFound,
    #[error("Request was already processed ({status}).")]
    RequestNotPending { status: String },
    #[error("A reason is required to reject a request.")]
    RejectReasonRequired,
    #[error("Invalid storage path.")]
    InvalidStoragePath,
    #[error("Stored document `{key}` is damaged; fix or restore it before making changes.")]
    CorruptDocument { key: String },
    #[error("Backup could not be decrypted.")]
    BackupDecrypt,
    #[error("crypto failure: {0}")]
    Crypto(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl OfficeError {
    /// Stable code handed to the frontend; the webview switches on these.
    pub fn code(&self) -> String {
        match self {
            Self::CompleteAllFields => "COMPLETE_ALL_FIELDS".to_string(),
            Self::UsernameExists => "USERNAME_EXISTS".to_string(),
            Self::InvalidCredentials => "INVALID_CREDENTIALS".to_string(),
            Self::NotAuthenticated => "NOT_AUTHENTICATED".to_string(),
            Self::NotAuthorized => "NOT_AUTHORIZED".to_string(),
            Self::ItemNotFound => "ITEM_NOT_FOUND".to_string(),
            Self::InvalidQty => "INVALID_QTY".to_string(),
            Self::NotEnoughStock { name, available } => {
                format!("NOT_ENOUGH_STOCK:{name}:{available}")
            }
            Self::NothingToReturn => "NOTHING_TO_RETURN".to_string(),
            Self::ReturnTooMuch { name, borrowed } => format!("RETURN_TOO_MUCH:{name}:{borrowed}"),
            Self::InvalidRequest => "INVALID_REQUEST".to_string(),
            Self::RequestNotFound => "REQUEST_NOT_FOUND".to_string(),
            Self::RequestNotPending { .. } => "REQUEST_NOT_PENDING".to_string(),
            Self::RejectReasonRequired => "REJECT_REASON_REQUIRED".to_string(),
            Self::InvalidStoragePath => "INVALID_STORAGE_PATH".to_string(),
            Self::CorruptDocument { key } => format!("CORRUPT_DOCUMENT:{key}"),
            Self::BackupDecrypt => "BACKUP_DECRYPT_FAILED".to_string(),
            Self::Crypto(_) => "CRYPTO_FAILURE".to_string(),
            Self::Io(_) => "STORAGE_IO".to_string(),
            Self::Json(_) => "STORAGE_JSON".to_string(),
        }
    }
}

impl From<OfficeError> for String {
    fn from(err: OfficeError) -> Self {
        err.code()
    }
}

pub type Result<T, E = OfficeError> = std::result::Result<T, E>;

use std::fmt::Display;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Database(rusqlite::Error),
    Io(std::io::Error),
    OpenSsl(openssl::error::ErrorStack),
    PasswordHash(argon2::password_hash::Error),
    Crypto(String),
    FileNotFound(PathBuf),
    MissingProperty(&'static str),
    UnsupportedVersion(i64),
    CertificateNotFound(i64),
    AlreadyRevoked(i64),
    DuplicateRequest(String),
    AlreadyProtected,
    NotProtected,
    WrongPassword,
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Database(e) => write!(f, "database error: {e}"),
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::OpenSsl(e) => write!(f, "PEM handling error: {e}"),
            Error::PasswordHash(e) => write!(f, "password hash error: {e}"),
            Error::Crypto(e) => write!(f, "private key encryption error: {e}"),
            Error::FileNotFound(path) => write!(f, "no store at {}", path.display()),
            Error::MissingProperty(name) => write!(f, "store property '{name}' is missing"),
            Error::UnsupportedVersion(v) => {
                write!(f, "store schema version {v} is newer than this build supports")
            }
            Error::CertificateNotFound(id) => write!(f, "no certificate with id {id}"),
            Error::AlreadyRevoked(id) => write!(f, "certificate {id} is already revoked"),
            Error::DuplicateRequest(dn) => {
                write!(f, "a pending request for '{dn}' already exists")
            }
            Error::AlreadyProtected => write!(f, "store is already password protected"),
            Error::NotProtected => write!(f, "store is not password protected"),
            Error::WrongPassword => write!(f, "wrong password"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Database(e) => Some(e),
            Error::Io(e) => Some(e),
            Error::OpenSsl(e) => Some(e),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(error: rusqlite::Error) -> Self {
        Error::Database(error)
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::Io(error)
    }
}

impl From<openssl::error::ErrorStack> for Error {
    fn from(error: openssl::error::ErrorStack) -> Self {
        Error::OpenSsl(error)
    }
}

impl From<argon2::password_hash::Error> for Error {
    fn from(error: argon2::password_hash::Error) -> Self {
        Error::PasswordHash(error)
    }
}

//! # Registro de errores
//!
//! Registra la cadena completa de causas de un error junto a la operación en
//! curso, para que cada fallo del backend quede en el log aunque el cliente
//! solo reciba un mensaje genérico.

use std::error::Error as StdError;

fn error_chain<E>(error: &E) -> Vec<String>
where
    E: StdError + 'static,
{
    let mut chain = Vec::new();
    let mut current: Option<&dyn StdError> = Some(error);

    while let Some(err) = current {
        chain.push(err.to_string());
        current = err.source();
    }
    chain
}

pub fn log_error_chain<E>(error: &E, context: &str)
where
    E: StdError + 'static,
{
    tracing::error!(
        context = %context,
        error_chain = ?error_chain(error),
        "Error with full chain"
    );
}

/// Extension trait para Results que registra la cadena de errores
///
/// ```ignore
/// repo.restaurants()
///     .find_one(filter)
///     .await
///     .log_error_context("getting restaurant")?;
/// ```
pub trait ErrorLogExt<T, E> {
    fn log_error_context(self, context: &str) -> Result<T, E>;

    /// Igual que `log_error_context` pero como advertencia: para pasos
    /// secundarios cuyo fallo no interrumpe la operación
    fn log_warn_context(self, context: &str) -> Result<T, E>;
}

impl<T, E> ErrorLogExt<T, E> for Result<T, E>
where
    E: StdError + 'static,
{
    fn log_error_context(self, context: &str) -> Result<T, E> {
        if let Err(ref error) = self {
            log_error_chain(error, context);
        }
        self
    }

    fn log_warn_context(self, context: &str) -> Result<T, E> {
        if let Err(ref error) = self {
            tracing::warn!(
                context = %context,
                error_chain = ?error_chain(error),
                "Warning with error chain"
            );
        }
        self
    }
}

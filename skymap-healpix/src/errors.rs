use thiserror::Error;

pub type HealpixResult<T> = Result<T, HealpixError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HealpixError {
    #[error("Invalid tile id {uniq}: {message}")]
    InvalidTileId { uniq: u64, message: String },

    #[error("Invalid order {order}: {message}")]
    InvalidOrder { order: u32, message: String },

    #[error("Invalid pixel {ipix} at order {order}: outside [0, {npix})")]
    InvalidPixel { order: u32, ipix: u64, npix: u64 },
}

impl HealpixError {
    pub fn invalid_tile_id(uniq: u64, message: impl Into<String>) -> Self {
        Self::InvalidTileId {
            uniq,
            message: message.into(),
        }
    }

    pub fn invalid_order(order: u32, message: impl Into<String>) -> Self {
        Self::InvalidOrder {
            order,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_tile_id_message() {
        let err = HealpixError::invalid_tile_id(3, "below the order-0 range");
        assert_eq!(
            err.to_string(),
            "Invalid tile id 3: below the order-0 range"
        );
    }

    #[test]
    fn test_invalid_pixel_message() {
        let err = HealpixError::InvalidPixel {
            order: 1,
            ipix: 48,
            npix: 48,
        };
        assert!(err.to_string().contains("[0, 48)"));
    }
}

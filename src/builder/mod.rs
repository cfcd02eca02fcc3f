mod ec;
mod qr;

pub use qr::{Module, QR};

use tracing::debug;

use crate::common::{
    codec,
    error::{QRError, QRResult},
    mask::{apply_best_mask, MaskPattern},
    metadata::{ECLevel, Version},
    BitStream,
};
use ec::{ecc, interleave};

pub struct QRBuilder<'a> {
    data: &'a [u8],
    version: Option<Version>,
    ec_level: ECLevel,
    mask: Option<MaskPattern>,
}

impl<'a> QRBuilder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, version: None, ec_level: ECLevel::H, mask: None }
    }

    pub fn data(&mut self, data: &'a [u8]) -> &mut Self {
        self.data = data;
        self
    }

    pub fn version(&mut self, version: Version) -> &mut Self {
        self.version = Some(version);
        self
    }

    pub fn unset_version(&mut self) -> &mut Self {
        self.version = None;
        self
    }

    pub fn ec_level(&mut self, ec_level: ECLevel) -> &mut Self {
        self.ec_level = ec_level;
        self
    }

    pub fn mask(&mut self, mask: MaskPattern) -> &mut Self {
        self.mask = Some(mask);
        self
    }

    pub fn metadata(&self) -> String {
        match self.version {
            Some(v) => format!("{{ Version: {}, Ec level: {:?} }}", *v, self.ec_level),
            None => format!("{{ Version: None, Ec level: {:?} }}", self.ec_level),
        }
    }
}


impl QRBuilder<'_> {
    pub fn build(&self) -> QRResult<QR> {
        debug!(metadata = %self.metadata(), len = self.data.len(), "Generating QR");
        if self.data.is_empty() {
            return Err(QRError::EmptyData);
        }

        let (encoded_data, version) = match self.version {
            Some(v) => (codec::encode_with_version(self.data, self.ec_level, v)?, v),
            None => codec::encode(self.data, self.ec_level)?,
        };

        // Compute error correction codewords, then interleave data & ecc
        let (data_blocks, ecc_blocks) = ecc(encoded_data.data(), version, self.ec_level);
        let mut payload = BitStream::new(version.total_codewords() << 3);
        payload.extend(&interleave(&data_blocks));
        payload.extend(&interleave(&ecc_blocks));

        let mut qr = QR::new(version, self.ec_level);
        qr.draw_all_function_patterns();
        qr.draw_encoding_region(&payload);

        let mask = match self.mask {
            Some(m) => {
                qr.apply_mask(m);
                m
            }
            None => apply_best_mask(&mut qr),
        };

        let total_modules = version.width() * version.width();
        debug!(
            version = *version,
            mask = *mask,
            data_codewords = version.data_codewords(self.ec_level),
            dark_ratio = qr.count_dark_modules() as f64 / total_modules as f64,
            "QR generated"
        );

        Ok(qr)
    }
}

/// Encodes a payload, picking the smallest version that fits at the given
/// error correction level.
pub fn encode(payload: &str, ecl: ECLevel) -> QRResult<QR> {
    QRBuilder::new(payload.as_bytes()).ec_level(ecl).build()
}

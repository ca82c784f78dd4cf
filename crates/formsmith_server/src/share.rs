//! Share links and QR codes.

use qrcode::render::svg;
use qrcode::QrCode;

use formsmith_core::error::FormsmithError;
use formsmith_core::proto::ShareResponse;
use formsmith_core::types::Form;

#[derive(Clone)]
pub struct ShareConfig {
    /// Base URL the SPA is served from, e.g. `https://forms.example.com`.
    pub public_base_url: String,
}

impl ShareConfig {
    pub fn share_url(&self, share_code: &str) -> String {
        format!(
            "{}/f/{share_code}",
            self.public_base_url.trim_end_matches('/')
        )
    }
}

pub fn share_response(config: &ShareConfig, form: &Form) -> Result<ShareResponse, FormsmithError> {
    let share_url = config.share_url(&form.share_code);
    let code = QrCode::new(share_url.as_bytes())
        .map_err(|e| FormsmithError::Internal(anyhow::anyhow!("qr encode failed: {e}")))?;
    let qr_svg = code
        .render::<svg::Color>()
        .min_dimensions(200, 200)
        .build();
    Ok(ShareResponse { share_url, qr_svg })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn form(share_code: &str) -> Form {
        Form {
            form_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            title: "t".into(),
            description: None,
            is_published: true,
            share_code: share_code.into(),
            fields: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn share_url_joins_without_double_slash() {
        let cfg = ShareConfig {
            public_base_url: "https://forms.example.com/".into(),
        };
        assert_eq!(
            cfg.share_url("abc123"),
            "https://forms.example.com/f/abc123"
        );
    }

    #[test]
    fn qr_svg_embeds_markup() {
        let cfg = ShareConfig {
            public_base_url: "https://forms.example.com".into(),
        };
        let resp = share_response(&cfg, &form("abc123")).unwrap();
        assert!(resp.qr_svg.contains("<svg"));
        assert_eq!(resp.share_url, "https://forms.example.com/f/abc123");
    }
}

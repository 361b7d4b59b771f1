//! WhatsApp share link for an honor plan.

use std::fmt::Write as _;

use fw_roster::parse_calendar_date;

use super::model::HonorPlan;

const WHATSAPP_BASE: &str = "https://wa.me/?text=";

/// Compose the invitation text for `plan`.
///
/// `honoree_names` are the display names of the plan's honorees, already
/// resolved by the caller.
#[must_use]
pub fn share_message(plan: &HonorPlan, honoree_names: &[String]) -> String {
    let date = parse_calendar_date(&plan.target_date).map_or_else(
        |_| "date to be announced".to_string(),
        |d| d.format("%d %B").to_string(),
    );

    let mut message = format!(
        "*SPECIAL HONOR: {}*\n\nFamily, we will be honoring *{}* on {date}.\n\n",
        plan.title,
        honoree_names.join(", ")
    );
    if !plan.public_message.is_empty() {
        let _ = write!(message, "{}\n\n", plan.public_message);
    }

    if plan.mobile_payment.is_some() || plan.qr_url.is_some() {
        message.push_str("*HOW TO CONTRIBUTE:*\n");
        if let Some(payment) = &plan.mobile_payment {
            for (label, value) in [
                ("Bank", &payment.bank),
                ("Phone", &payment.phone),
                ("ID", &payment.national_id),
            ] {
                if let Some(value) = value {
                    let _ = writeln!(message, "{label}: {value}");
                }
            }
        }
        if plan.qr_url.is_some() {
            message.push_str("(See the QR code in the app)\n");
        }
    }

    message.push_str("\nDon't miss it!");
    message
}

/// `https://wa.me/?text=` followed by the percent-encoded message.
#[must_use]
pub fn whatsapp_link(message: &str) -> String {
    format!("{WHATSAPP_BASE}{}", urlencoding::encode(message))
}

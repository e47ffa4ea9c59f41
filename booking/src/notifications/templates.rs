//! Subject and HTML bodies for the three booking emails.

use crate::types::{Activity, BookingRequest, EmailType, Money};
use chrono::{DateTime, Utc};
use std::fmt::Write as _;

const STYLES: &str = "<style>\
body{font-family:Arial,sans-serif;line-height:1.6;color:#333}\
.container{max-width:600px;margin:0 auto;padding:20px}\
.header{background:#2e7d32;color:#fff;padding:24px;text-align:center;border-radius:10px 10px 0 0}\
.content{background:#fff;padding:24px;border:1px solid #ddd}\
.info{background:#f8f9fa;padding:16px;border-radius:8px;margin:16px 0}\
.button{display:inline-block;background:#ff6b35;color:#fff;padding:12px 30px;text-decoration:none;border-radius:6px}\
.footer{text-align:center;padding:16px;color:#666;font-size:12px}\
</style>";

/// Everything a template may interpolate
#[derive(Clone, Debug)]
pub struct TemplateContext<'a> {
    /// Booking the email is about
    pub booking: &'a BookingRequest,
    /// Its activity
    pub activity: &'a Activity,
    /// Greeting name, if known
    pub recipient_name: Option<&'a str>,
    /// Seats held by the recipient (payment emails)
    pub recipient_seats: Option<u32>,
    /// Share URL (recruitment)
    pub share_url: Option<&'a str>,
}

/// A rendered subject and body
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rendered {
    /// Subject line
    pub subject: String,
    /// HTML body
    pub html: String,
}

/// Escape text for inclusion in HTML
#[must_use]
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// `Sat 14 Jun 2025, 10:00 UTC`
#[must_use]
pub fn format_when(at: DateTime<Utc>) -> String {
    at.format("%a %-d %b %Y, %H:%M UTC").to_string()
}

fn wrap(title: &str, content: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\">{STYLES}</head><body>\
         <div class=\"container\"><div class=\"header\"><h1>{title}</h1></div>\
         <div class=\"content\">{content}</div>\
         <div class=\"footer\">You are receiving this email because of a group booking request.</div>\
         </div></body></html>"
    )
}

fn greeting(name: Option<&str>) -> String {
    name.map_or_else(|| "<p>Hello,</p>".to_string(), |n| format!("<p>Hello {},</p>", escape_html(n)))
}

/// Render the email for `kind`
#[must_use]
pub fn render(kind: EmailType, ctx: &TemplateContext<'_>) -> Rendered {
    match kind {
        EmailType::Recruitment => recruitment(ctx),
        EmailType::PaymentRequired => payment_required(ctx),
        EmailType::MinimumReached => minimum_reached(ctx),
    }
}

fn recruitment(ctx: &TemplateContext<'_>) -> Rendered {
    let title = escape_html(&ctx.activity.title);
    let missing = ctx
        .activity
        .min_participants
        .saturating_sub(ctx.booking.current_participants);

    let mut content = greeting(ctx.recipient_name);
    let _ = write!(
        content,
        "<p>Your group booking for <strong>{title}</strong> has been received.</p>\
         <div class=\"info\"><p><strong>Date:</strong> {when}</p>\
         <p><strong>Participants so far:</strong> {current} of {min} needed</p></div>\
         <p>This session goes ahead once <strong>{missing} more</strong> participant{plural} join. \
         Share this link with friends, family or classmates:</p>",
        when = format_when(ctx.booking.requested_date_time),
        current = ctx.booking.current_participants,
        min = ctx.activity.min_participants,
        plural = if missing == 1 { "" } else { "s" },
    );
    if let Some(url) = ctx.share_url {
        let url = escape_html(url);
        let _ = write!(
            content,
            "<p><a class=\"button\" href=\"{url}\">Invite participants</a></p><p>{url}</p>"
        );
    }

    Rendered {
        subject: format!("Invite others to join {}", ctx.activity.title),
        html: wrap("Share your booking", &content),
    }
}

fn payment_required(ctx: &TemplateContext<'_>) -> Rendered {
    let title = escape_html(&ctx.activity.title);
    let seats = ctx.recipient_seats.unwrap_or(1);
    let price = ctx.activity.price_per_person;

    let mut content = greeting(ctx.recipient_name);
    let _ = write!(
        content,
        "<p>Good news: <strong>{title}</strong> has reached its minimum of {min} participants \
         and will go ahead.</p>\
         <div class=\"info\"><p><strong>Date:</strong> {when}</p>\
         <p><strong>Participants:</strong> {current}</p>",
        min = ctx.activity.min_participants,
        when = format_when(ctx.booking.requested_date_time),
        current = ctx.booking.current_participants,
    );
    if !price.is_zero() {
        let _ = write!(
            content,
            "<p><strong>Your places:</strong> {seats} × {price} = {total}</p>",
            total = Money::times(price, seats),
        );
    }
    content.push_str("</div>");
    if let Some(deadline) = ctx.booking.payment_deadline {
        let _ = write!(
            content,
            "<p>Please complete payment before <strong>{}</strong>. \
             Unpaid bookings are released after the deadline.</p>",
            format_when(deadline)
        );
    }

    Rendered {
        subject: format!("Payment required: {} is going ahead", ctx.activity.title),
        html: wrap("Payment required", &content),
    }
}

fn minimum_reached(ctx: &TemplateContext<'_>) -> Rendered {
    let mut content = String::new();
    let _ = write!(
        content,
        "<p>A group booking reached its minimum participant count.</p>\
         <div class=\"info\"><p><strong>Activity:</strong> {title}</p>\
         <p><strong>Booking:</strong> {id}</p>\
         <p><strong>Date:</strong> {when}</p>\
         <p><strong>Participants:</strong> {current} (minimum {min})</p>",
        title = escape_html(&ctx.activity.title),
        id = ctx.booking.id,
        when = format_when(ctx.booking.requested_date_time),
        current = ctx.booking.current_participants,
        min = ctx.activity.min_participants,
    );
    if let Some(deadline) = ctx.booking.payment_deadline {
        let _ = write!(content, "<p><strong>Payment deadline:</strong> {}</p>", format_when(deadline));
    }
    content.push_str("</div>");

    Rendered {
        subject: format!("Minimum reached: {}", ctx.activity.title),
        html: wrap("Minimum participants reached", &content),
    }
}

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use whatsapp_webhooks::config::Config;
use whatsapp_webhooks::server::serve;
use whatsapp_webhooks::webhooks::{Handlers, MessageContext};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "whatsapp_webhooks=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().inspect_err(|e| error!(error = %e, "Invalid configuration"))?;
    info!(config = ?config, "Loaded configuration");

    serve(&config, logging_handlers()).await
}

fn log_message(ctx: &MessageContext<'_>, kind: &str) {
    info!(
        phone_number_id = %ctx.phone_number_id(),
        from = %ctx.message.from,
        sender = ctx.sender_name().unwrap_or(""),
        message_id = ctx.message.id.short(),
        kind,
        "Received message"
    );
}

/// Logs every event category so a fresh deployment shows its traffic.
fn logging_handlers() -> Handlers {
    let mut handlers = Handlers::new();

    handlers
        .on_account_alerts(|event, alert| {
            warn!(
                account_id = %event.account_id,
                alert_type = %alert.alert_info.alert_type,
                severity = %alert.alert_info.alert_severity,
                "Account alert"
            );
            Ok(())
        })
        .on_template_status(|_, update| {
            info!(
                template = %update.message_template_name,
                event = %update.event,
                "Template status changed"
            );
            Ok(())
        })
        .on_template_category(|_, update| {
            info!(
                template = %update.message_template_name,
                category = %update.new_category,
                "Template category changed"
            );
            Ok(())
        })
        .on_template_quality(|_, update| {
            info!(
                template = %update.message_template_name,
                quality = %update.new_quality_score,
                "Template quality changed"
            );
            Ok(())
        })
        .on_phone_number_name(|_, update| {
            info!(
                number = %update.display_phone_number,
                decision = %update.decision,
                "Display name reviewed"
            );
            Ok(())
        })
        .on_phone_number_quality(|_, update| {
            info!(
                number = %update.display_phone_number,
                event = %update.event,
                limit = %update.current_limit,
                "Messaging limit changed"
            );
            Ok(())
        })
        .on_account_update(|event, update| {
            warn!(account_id = %event.account_id, event = %update.event, "Account updated");
            Ok(())
        })
        .on_account_review(|event, update| {
            info!(
                account_id = %event.account_id,
                decision = %update.decision,
                "Account reviewed"
            );
            Ok(())
        })
        .on_business_capability(|event, update| {
            info!(
                account_id = %event.account_id,
                capability = ?update,
                "Business capability changed"
            );
            Ok(())
        })
        .on_flows(|_, flow| {
            info!(flow_id = %flow.flow_id, event = %flow.event, "Flow event");
            Ok(())
        });

    handlers
        .on_notification_errors(|ctx, errors| {
            for e in errors {
                warn!(phone_number_id = %ctx.phone_number_id(), error = %e, "Platform error");
            }
            Ok(())
        })
        .on_statuses(|_, statuses| {
            for status in statuses {
                info!(message_id = status.id.short(), status = %status.status, "Message status");
            }
            Ok(())
        })
        .on_user_preferences(|_, preferences| {
            for p in preferences {
                info!(
                    wa_id = %p.wa_id,
                    category = %p.category,
                    value = %p.value,
                    "User preference changed"
                );
            }
            Ok(())
        });

    handlers
        .on_text(|ctx, _| {
            log_message(ctx, "text");
            Ok(())
        })
        .on_product_enquiry(|ctx, _, product| {
            log_message(ctx, "product_enquiry");
            info!(product = %product.product_retailer_id, "Product enquiry");
            Ok(())
        })
        .on_referral(|ctx, _, referral| {
            log_message(ctx, "referral");
            info!(source = referral.source_url.as_deref().unwrap_or(""), "Referral");
            Ok(())
        })
        .on_image(|ctx, _| {
            log_message(ctx, "image");
            Ok(())
        })
        .on_audio(|ctx, _| {
            log_message(ctx, "audio");
            Ok(())
        })
        .on_video(|ctx, _| {
            log_message(ctx, "video");
            Ok(())
        })
        .on_document(|ctx, _| {
            log_message(ctx, "document");
            Ok(())
        })
        .on_sticker(|ctx, _| {
            log_message(ctx, "sticker");
            Ok(())
        })
        .on_location(|ctx, _| {
            log_message(ctx, "location");
            Ok(())
        })
        .on_contacts(|ctx, _| {
            log_message(ctx, "contacts");
            Ok(())
        })
        .on_reaction(|ctx, _| {
            log_message(ctx, "reaction");
            Ok(())
        })
        .on_button(|ctx, _| {
            log_message(ctx, "button");
            Ok(())
        })
        .on_order(|ctx, order| {
            log_message(ctx, "order");
            info!(items = order.product_items.len(), total = order.total(), "Order");
            Ok(())
        })
        .on_system(|ctx, _| {
            log_message(ctx, "system");
            Ok(())
        })
        .on_customer_identity_change(|ctx, _| {
            log_message(ctx, "identity");
            Ok(())
        })
        .on_button_reply(|ctx, _| {
            log_message(ctx, "button_reply");
            Ok(())
        })
        .on_list_reply(|ctx, _| {
            log_message(ctx, "list_reply");
            Ok(())
        })
        .on_flow_completion(|ctx, _| {
            log_message(ctx, "flow_completion");
            Ok(())
        })
        .on_address_submission(|ctx, _| {
            log_message(ctx, "address_submission");
            Ok(())
        })
        .on_interactive(|ctx, interactive| {
            log_message(ctx, interactive.interactive_type());
            Ok(())
        })
        .on_message_errors(|ctx, errors| {
            log_message(ctx, "unknown");
            for e in errors {
                warn!(error = %e, "Unknown message");
            }
            Ok(())
        })
        .on_unsupported(|ctx, errors| {
            log_message(ctx, "unsupported");
            for e in errors {
                warn!(error = %e, "Unsupported message");
            }
            Ok(())
        })
        .on_welcome(|ctx, _| {
            log_message(ctx, "request_welcome");
            Ok(())
        });

    handlers
}

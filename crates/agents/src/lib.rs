use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use pinplace_core::prompt::build_system_prompt;
use pinplace_core::spatial::{distance, find_in_radius};
use pinplace_core::{
    reply, AssistantContext, ChatbotResponse, ClassifiedIntent, Intent, IntentError, Located,
    MapPolicy, PolicyViolation, RouteSource, SpatialQuery,
};
use pinplace_directions::{format_distance, format_duration, RoutePlanner};
use pinplace_geocoding::{is_zip, Geocoder};
use pinplace_inference::IntentClassifier;
use pinplace_observability::AppMetrics;
use reqwest::Client;
use tracing::{info, instrument, warn};

/// Shared HTTP client for every outbound provider.
pub fn build_http_client(timeout: Duration, user_agent: &str) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()
        .context("failed building http client")
}

/// Routes one chat message to the resolver it needs. Never mutates pins;
/// changes come back as actions for the caller to apply.
#[derive(Clone)]
pub struct MapAssistant {
    geocoder: Arc<dyn Geocoder>,
    planner: Arc<dyn RoutePlanner>,
    classifier: Arc<dyn IntentClassifier>,
    policy: MapPolicy,
    metrics: Arc<AppMetrics>,
}

impl MapAssistant {
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        planner: Arc<dyn RoutePlanner>,
        classifier: Arc<dyn IntentClassifier>,
        metrics: Arc<AppMetrics>,
    ) -> Self {
        Self {
            geocoder,
            planner,
            classifier,
            policy: MapPolicy::new(),
            metrics,
        }
    }

    pub fn classifier_name(&self) -> &'static str {
        self.classifier.name()
    }

    #[instrument(skip(self, message, context), fields(map = %context.map.name, pins = context.pins.len()))]
    pub async fn handle_message(&self, message: &str, context: &AssistantContext) -> ChatbotResponse {
        let started = Instant::now();
        self.metrics.inc_request();
        let now = Utc::now();

        let system_prompt = build_system_prompt(context, now);
        let classified = match self.classifier.classify(&system_prompt, message.trim()).await {
            Ok(classified) => classified,
            Err(err) => {
                warn!(classifier = self.classifier.name(), error = %err, "intent classification failed");
                self.metrics.inc_classifier_failure();
                if let IntentError::Unavailable(provider_err) = &err {
                    self.metrics.inc_provider_failure(provider_err.provider());
                }
                self.metrics.observe_latency(started.elapsed());
                return reply::apology();
            }
        };

        let intent = classified.intent.name();
        let response = self.dispatch(classified, context, now).await;

        self.metrics.observe_latency(started.elapsed());
        info!(
            intent,
            action = response.action.is_some(),
            "message handled"
        );
        response
    }

    async fn dispatch(
        &self,
        classified: ClassifiedIntent,
        context: &AssistantContext,
        now: DateTime<Utc>,
    ) -> ChatbotResponse {
        let response_text = classified.response_text.as_deref();

        match classified.intent {
            Intent::Geocode { location } => {
                if let Err(violation) = self.policy.check_add_pin(context, now) {
                    return self.refuse(violation);
                }
                self.add_location(&location, response_text, now).await
            }
            Intent::CalculateDistance { pin1, pin2 } => {
                match (context.find_pin(&pin1), context.find_pin(&pin2)) {
                    (Some(from), Some(to)) => {
                        reply::distance_between(from, to, distance(from.point(), to.point()))
                    }
                    _ => reply::pins_not_found(context),
                }
            }
            Intent::FindRadius {
                center,
                radius_miles,
            } => {
                let hits = find_in_radius(
                    &context.pins,
                    &SpatialQuery {
                        center,
                        radius_miles,
                    },
                );
                reply::radius_matches(radius_miles, &hits)
            }
            Intent::DrivingTime { pin1, pin2 } => {
                let (Some(from), Some(to)) = (context.find_pin(&pin1), context.find_pin(&pin2))
                else {
                    return reply::pins_not_found(context);
                };
                let directions = self.planner.route(from.point(), to.point()).await;
                if directions.source == RouteSource::Estimate {
                    self.metrics.inc_fallback("route_estimate");
                }
                reply::driving_time(
                    from,
                    to,
                    &directions,
                    &format_duration(directions.duration_min),
                    &format_distance(directions.distance_km),
                )
            }
            Intent::DeleteAllPins => match self.policy.check_delete_all(context) {
                Ok(()) => reply::delete_all(context.pins.len(), response_text),
                Err(violation) => self.refuse(violation),
            },
            Intent::Chat => reply::chat(response_text),
        }
    }

    async fn add_location(
        &self,
        location: &str,
        response_text: Option<&str>,
        now: DateTime<Utc>,
    ) -> ChatbotResponse {
        let resolved = if is_zip(location) {
            self.geocoder.resolve_zip(location).await
        } else {
            self.geocoder.resolve_address(location).await
        };

        match resolved {
            Ok(result) => {
                if result.source.is_static() {
                    self.metrics.inc_fallback(result.source.as_str());
                }
                reply::pin_added(location, &result, response_text, now)
            }
            Err(err) => {
                info!(location, error = %err, "location not found");
                reply::location_not_found(location)
            }
        }
    }

    fn refuse(&self, violation: PolicyViolation) -> ChatbotResponse {
        let reason = match violation {
            PolicyViolation::MapLocked => "map_locked",
            PolicyViolation::NotCreator => "not_creator",
            PolicyViolation::NoPins => "no_pins",
        };
        self.metrics.inc_refusal(reason);
        ChatbotResponse::message(self.policy.refusal_message(violation))
    }
}

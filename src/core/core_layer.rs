// The core module contains all business logic.
// Each feature gets its own submodule. Nothing in here imports
// serenity or poise - the Discord layer adapts these services.

#[path = "settings/settings_service.rs"]
pub mod settings;

#[path = "leveling/leveling_service.rs"]
pub mod leveling;

#[path = "moderation/moderation_service.rs"]
pub mod moderation;

#[path = "gateway/messaging_gateway.rs"]
pub mod gateway;

#[path = "random/random_source.rs"]
pub mod random;

#[path = "router/command_router.rs"]
pub mod router;

#[path = "responses/formatter.rs"]
pub mod responses;

use rustrict::CensorStr;

pub const MAX_PLAYER_NAME_CHARS: usize = 24;
pub const MAX_HAT_NAME_CHARS: usize = 64;

/// Validate and trim the name a player joins with.
/// Returns the trimmed name on success, or the message to show the player.
pub fn validate_player_name(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("Name cannot be empty".to_string());
    }
    if trimmed.chars().count() > MAX_PLAYER_NAME_CHARS {
        return Err(format!("Name must be {MAX_PLAYER_NAME_CHARS} characters or fewer"));
    }
    if trimmed.is_inappropriate() {
        return Err("Name contains inappropriate language".to_string());
    }
    Ok(trimmed.to_string())
}

/// Validate a name submitted to the hat. These are famous people, so no profanity filter.
pub fn validate_hat_name(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("Name cannot be empty".to_string());
    }
    if trimmed.chars().count() > MAX_HAT_NAME_CHARS {
        return Err(format!("Names must be {MAX_HAT_NAME_CHARS} characters or fewer"));
    }
    Ok(trimmed.to_string())
}

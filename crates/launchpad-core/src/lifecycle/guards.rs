//! Guards - 審査提出前のチェック

use super::error::LifecycleError;
use crate::domain::{DistributeType, GameRecord, MediaKind};

/// 配信形態ごとの必須メディア
pub fn required_media(distribute_type: DistributeType) -> [MediaKind; 4] {
    let package = match distribute_type {
        DistributeType::Apk => MediaKind::ApkFile,
        DistributeType::H5Link => MediaKind::H5Link,
    };
    [MediaKind::Icon, MediaKind::Screenshot, MediaKind::Video, package]
}

pub fn check_submission(game: &GameRecord, media: &[MediaKind]) -> Result<(), LifecycleError> {
    let missing_fields: Vec<&'static str> = [
        ("name", &game.name),
        ("developer", &game.developer),
        ("publisher", &game.publisher),
    ]
    .into_iter()
    .filter(|(_, value)| value.trim().is_empty())
    .map(|(field, _)| field)
    .collect();
    if !missing_fields.is_empty() {
        return Err(LifecycleError::MissingFields(missing_fields));
    }

    let missing_media: Vec<MediaKind> = required_media(game.distribute_type)
        .into_iter()
        .filter(|kind| !media.contains(kind))
        .collect();
    if !missing_media.is_empty() {
        return Err(LifecycleError::MissingMedia(missing_media));
    }
    Ok(())
}

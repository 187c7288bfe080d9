//! Cityscapes raw-id to train-id remapping.

/// Sentinel for pixels that are never scored.
pub const IGNORE_LABEL: u8 = 255;

/// Size of the compact Cityscapes train-id space.
pub const CITYSCAPES_NUM_CLASSES: usize = 19;

const I: u8 = IGNORE_LABEL;

/// Train ids for raw ids `-1..=33`, indexed by `raw + 1`.
const ID2LABEL: [u8; 35] = [
    I, // -1 license plate
    I, I, I, I, I, I, I, // 0..=6 void and flat-ground extras
    0, 1, // 7 road, 8 sidewalk
    I, I, // 9 parking, 10 rail track
    2, 3, 4, // 11 building, 12 wall, 13 fence
    I, I, I, // 14 guard rail, 15 bridge, 16 tunnel
    5, // 17 pole
    I, // 18 polegroup
    6, 7, 8, 9, 10, 11, 12, 13, 14, 15, // 19..=28
    I, I, // 29 caravan, 30 trailer
    16, 17, 18, // 31 train, 32 motorcycle, 33 bicycle
];

/// Compact train id for a raw Cityscapes label id.
///
/// Ids outside the table map to [`IGNORE_LABEL`].
pub fn id2label(raw: i32) -> u8 {
    usize::try_from(raw + 1)
        .ok()
        .and_then(|index| ID2LABEL.get(index).copied())
        .unwrap_or(IGNORE_LABEL)
}

/// Remap a buffer of raw label ids in place.
pub fn remap_label_ids(labels: &mut [u8]) {
    for label in labels {
        *label = id2label(i32::from(*label));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id2label_covers_all_nineteen_train_ids() {
        let mut train_ids = (-1..=33)
            .map(id2label)
            .filter(|&id| id != IGNORE_LABEL)
            .collect::<Vec<_>>();
        train_ids.sort_unstable();
        assert_eq!(train_ids, (0..CITYSCAPES_NUM_CLASSES as u8).collect::<Vec<_>>());
    }

    #[test]
    fn id2label_matches_known_entries() {
        assert_eq!(id2label(-1), IGNORE_LABEL);
        assert_eq!(id2label(0), IGNORE_LABEL);
        assert_eq!(id2label(7), 0);
        assert_eq!(id2label(8), 1);
        assert_eq!(id2label(17), 5);
        assert_eq!(id2label(26), 13);
        assert_eq!(id2label(33), 18);
    }

    #[test]
    fn id2label_maps_unknown_ids_to_ignore() {
        assert_eq!(id2label(34), IGNORE_LABEL);
        assert_eq!(id2label(255), IGNORE_LABEL);
        assert_eq!(id2label(-7), IGNORE_LABEL);
    }

    #[test]
    fn remap_label_ids_rewrites_buffer() {
        let mut labels = [7, 8, 0, 33, 255];
        remap_label_ids(&mut labels);
        assert_eq!(labels, [0, 1, IGNORE_LABEL, 18, IGNORE_LABEL]);
    }
}

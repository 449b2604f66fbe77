//! The 7-class ethnicity taxonomy of the trained network.
//!
//! The order of [`Ethnicity::ALL`] is the output-layer order of the
//! classifier: index `i` of a probability vector is the probability of
//! `ALL[i]`. The network and this table must change together; reordering
//! either alone silently mislabels every prediction.

/// Number of classes in the classifier output layer.
pub const CLASS_COUNT: usize = 7;

/// Probability above which a class renders as "detected" in the per-label
/// description text. The threshold itself is below: exactly 0.3 renders
/// the "Minimal" form.
pub const DETAIL_THRESHOLD: f32 = 0.3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ethnicity {
    Black,
    EastAsian,
    White,
    Indian,
    LatinoHispanic,
    MiddleEastern,
    SoutheastAsian,
}

impl Ethnicity {
    /// Output-layer order of the trained network. Do not reorder.
    pub const ALL: [Ethnicity; CLASS_COUNT] = [
        Ethnicity::Black,
        Ethnicity::EastAsian,
        Ethnicity::White,
        Ethnicity::Indian,
        Ethnicity::LatinoHispanic,
        Ethnicity::MiddleEastern,
        Ethnicity::SoutheastAsian,
    ];

    /// JSON key used in `predictions` and `details`.
    pub fn label(self) -> &'static str {
        match self {
            Ethnicity::Black => "Black",
            Ethnicity::EastAsian => "East Asian",
            Ethnicity::White => "White",
            Ethnicity::Indian => "Indian",
            Ethnicity::LatinoHispanic => "Latino_Hispanic",
            Ethnicity::MiddleEastern => "Middle Eastern",
            Ethnicity::SoutheastAsian => "Southeast Asian",
        }
    }

    fn phrase(self) -> &'static str {
        match self {
            Ethnicity::Black => "African/Black features",
            Ethnicity::EastAsian => "East Asian features",
            Ethnicity::White => "European/White features",
            Ethnicity::Indian => "Indian features",
            Ethnicity::LatinoHispanic => "Latino/Hispanic features",
            Ethnicity::MiddleEastern => "Middle Eastern features",
            Ethnicity::SoutheastAsian => "Southeast Asian features",
        }
    }

    /// Templated description for this class at the given probability.
    pub fn detail_text(self, probability: f32) -> String {
        if probability > DETAIL_THRESHOLD {
            format!("{} detected", self.phrase())
        } else {
            format!("Minimal {}", self.phrase())
        }
    }
}

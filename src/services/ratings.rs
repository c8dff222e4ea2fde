/// Aggregate rating fields stored on a title
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingStats {
    pub average: f64,
    pub count: i32,
}

impl RatingStats {
    pub const EMPTY: RatingStats = RatingStats {
        average: 0.0,
        count: 0,
    };

    /// Folds one new rating into the stats.
    ///
    /// The first rating seeds the average. Every later rating is blended
    /// half-and-half with the previous average, whatever the count. This is
    /// not the arithmetic mean.
    pub fn record(self, rating: i32) -> RatingStats {
        let rating = f64::from(rating);
        let average = if self.count == 0 {
            rating
        } else {
            (self.average + rating) / 2.0
        };

        RatingStats {
            average,
            count: self.count + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_rating_seeds_average() {
        for rating in 1..=5 {
            let stats = RatingStats::EMPTY.record(rating);
            assert_eq!(stats.average, f64::from(rating));
            assert_eq!(stats.count, 1);
        }
    }

    #[test]
    fn test_later_ratings_blend_with_previous_average() {
        let stats = RatingStats::EMPTY.record(4).record(5);
        assert_eq!(stats.average, 4.5);
        assert_eq!(stats.count, 2);
    }

    #[test]
    fn test_blend_is_not_the_arithmetic_mean() {
        let stats = RatingStats {
            average: 5.0,
            count: 9,
        }
        .record(1);

        assert_eq!(stats.average, 3.0);
        assert_eq!(stats.count, 10);

        let true_mean = (5.0 * 9.0 + 1.0) / 10.0;
        assert_ne!(stats.average, true_mean);
    }

    #[test]
    fn test_sequence_of_ratings() {
        let stats = [2, 4, 5, 1]
            .into_iter()
            .fold(RatingStats::EMPTY, RatingStats::record);
        // 2 -> 3 -> 4 -> 2.5
        assert_eq!(stats.average, 2.5);
        assert_eq!(stats.count, 4);
    }
}

use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::warn;
use utoipa::ToSchema;

use crate::config::FeeConfig;
use crate::entities::restaurant;

/// Address classification driving the per-km rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, ToSchema)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    Urban,
    Suburban,
    Rural,
}

/// Everything the calculator needs for one order quote. Live order and
/// driver counts come from the caller so the calculator stays pure.
#[derive(Debug, Clone)]
pub struct FeeInput<'a> {
    pub restaurant: &'a restaurant::Model,
    pub delivery_city: &'a str,
    pub delivery_sub_city: Option<&'a str>,
    pub distance_km: f64,
    pub subtotal: Decimal,
    pub now: DateTime<Utc>,
    pub active_orders: u64,
    pub available_drivers: u64,
}

/// The computed monetary breakdown for an order at creation time.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FeeQuote {
    pub location_type: LocationType,
    pub distance_km: f64,
    pub delivery_fee: Decimal,
    pub service_fee: Decimal,
    /// Happy-hour discount on the item subtotal; zero when inactive.
    pub discount: Decimal,
}

/// Rounds to cents, half away from zero, matching persisted values.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn dec(value: f64) -> Decimal {
    Decimal::try_from(value).unwrap_or_default()
}

fn parse_window(raw: &str) -> Option<(NaiveTime, NaiveTime)> {
    let (start, end) = raw.split_once('-')?;
    let start = NaiveTime::parse_from_str(start.trim(), "%H:%M").ok()?;
    let end = NaiveTime::parse_from_str(end.trim(), "%H:%M").ok()?;
    Some((start, end))
}

fn weekday_token(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "mon",
        Weekday::Tue => "tue",
        Weekday::Wed => "wed",
        Weekday::Thu => "thu",
        Weekday::Fri => "fri",
        Weekday::Sat => "sat",
        Weekday::Sun => "sun",
    }
}

/// Delivery-fee and happy-hour calculator. Pure: all inputs arrive as
/// arguments, all money is rounded to cents at each computed boundary.
#[derive(Clone)]
pub struct FeeCalculator {
    config: FeeConfig,
    lunch_window: Option<(NaiveTime, NaiveTime)>,
    dinner_window: Option<(NaiveTime, NaiveTime)>,
}

impl FeeCalculator {
    pub fn new(config: FeeConfig) -> Self {
        let lunch_window = parse_window(&config.peak_lunch_window);
        let dinner_window = parse_window(&config.peak_dinner_window);
        if lunch_window.is_none() {
            warn!(window = %config.peak_lunch_window, "unparsable lunch peak window; peak pricing disabled for it");
        }
        if dinner_window.is_none() {
            warn!(window = %config.peak_dinner_window, "unparsable dinner peak window; peak pricing disabled for it");
        }
        Self {
            config,
            lunch_window,
            dinner_window,
        }
    }

    /// Classifies an address. Recognized urban centers are urban; an
    /// unrecognized city with a sub-city is suburban; otherwise rural.
    pub fn classify_location(&self, city: &str, sub_city: Option<&str>) -> LocationType {
        let city_norm = city.trim().to_lowercase();
        if self
            .config
            .urban_centers
            .iter()
            .any(|c| c.trim().to_lowercase() == city_norm)
        {
            LocationType::Urban
        } else if sub_city.map(|s| !s.trim().is_empty()).unwrap_or(false) {
            LocationType::Suburban
        } else {
            LocationType::Rural
        }
    }

    fn rate_per_km(&self, location_type: LocationType) -> Decimal {
        match location_type {
            LocationType::Urban => dec(self.config.urban_rate_per_km),
            LocationType::Suburban => dec(self.config.suburban_rate_per_km),
            LocationType::Rural => dec(self.config.rural_rate_per_km),
        }
    }

    /// Peak multiplier: both windows are same-day (no midnight wrap).
    fn peak_multiplier(&self, now: DateTime<Utc>) -> Decimal {
        let time = now.time();
        let in_window = |window: Option<(NaiveTime, NaiveTime)>| {
            window
                .map(|(start, end)| time >= start && time <= end)
                .unwrap_or(false)
        };
        if in_window(self.lunch_window) || in_window(self.dinner_window) {
            Decimal::ONE + dec(self.config.peak_percent) / dec(100.0)
        } else {
            Decimal::ONE
        }
    }

    /// Demand surge from the active-orders-to-available-drivers ratio.
    /// Zero available drivers prices at the ceiling; this is a deliberate
    /// scarce-supply policy, not a division workaround.
    fn surge_multiplier(&self, active_orders: u64, available_drivers: u64) -> Decimal {
        if available_drivers == 0 {
            return dec(self.config.surge_max_multiplier);
        }
        let ratio = active_orders as f64 / available_drivers as f64;
        if ratio >= self.config.surge_tier2_ratio {
            dec(self.config.surge_tier2_multiplier)
        } else if ratio >= self.config.surge_tier1_ratio {
            dec(self.config.surge_tier1_multiplier)
        } else {
            Decimal::ONE
        }
    }

    /// Happy-hour discount on the item subtotal. Zero unless the
    /// restaurant enables it and the current weekday, date range, and
    /// time window (which may wrap midnight) all match.
    pub fn happy_hour_discount(
        &self,
        restaurant: &restaurant::Model,
        subtotal: Decimal,
        now: DateTime<Utc>,
    ) -> Decimal {
        if !restaurant.happy_hour_enabled || restaurant.happy_hour_percent <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        if let Some(days) = restaurant.happy_hour_days.as_deref() {
            let today = weekday_token(now.weekday());
            let listed = days
                .split(',')
                .any(|d| d.trim().to_lowercase().starts_with(today));
            if !listed {
                return Decimal::ZERO;
            }
        }

        let date = now.date_naive();
        if let Some(start) = restaurant.happy_hour_start_date {
            if date < start {
                return Decimal::ZERO;
            }
        }
        if let Some(end) = restaurant.happy_hour_end_date {
            if date > end {
                return Decimal::ZERO;
            }
        }

        if let (Some(start_raw), Some(end_raw)) = (
            restaurant.happy_hour_start_time.as_deref(),
            restaurant.happy_hour_end_time.as_deref(),
        ) {
            let parsed = (
                NaiveTime::parse_from_str(start_raw.trim(), "%H:%M"),
                NaiveTime::parse_from_str(end_raw.trim(), "%H:%M"),
            );
            match parsed {
                (Ok(start), Ok(end)) => {
                    let time = now.time();
                    let inside = if start <= end {
                        time >= start && time <= end
                    } else {
                        // Window wraps midnight, e.g. 22:00-02:00.
                        time >= start || time <= end
                    };
                    if !inside {
                        return Decimal::ZERO;
                    }
                }
                _ => {
                    warn!(restaurant_id = %restaurant.id, "unparsable happy-hour times; treating as inactive");
                    return Decimal::ZERO;
                }
            }
        }

        round_money(subtotal * restaurant.happy_hour_percent / dec(100.0))
    }

    /// Full quote: distance-tiered fee, restaurant flat-fee override,
    /// peak and surge multipliers, minimum floor, happy-hour discount.
    pub fn quote(&self, input: FeeInput<'_>) -> FeeQuote {
        let location_type =
            self.classify_location(input.delivery_city, input.delivery_sub_city);
        let rate = self.rate_per_km(location_type);

        // A restaurant's own non-zero flat fee replaces the configured
        // base term; the distance term is still added.
        let base = if input.restaurant.flat_delivery_fee > Decimal::ZERO {
            input.restaurant.flat_delivery_fee
        } else {
            dec(self.config.base_fee)
        };
        let distance_term = round_money(dec(input.distance_km) * rate);
        let mut fee = round_money(base + distance_term);

        fee = round_money(fee * self.peak_multiplier(input.now));
        fee = round_money(
            fee * self.surge_multiplier(input.active_orders, input.available_drivers),
        );

        let minimum = dec(self.config.minimum_fee);
        if fee < minimum {
            fee = minimum;
        }

        let discount = self.happy_hour_discount(input.restaurant, input.subtotal, input.now);

        FeeQuote {
            location_type,
            distance_km: input.distance_km,
            delivery_fee: fee,
            service_fee: round_money(dec(self.config.service_fee)),
            discount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec as d;
    use uuid::Uuid;

    fn test_restaurant() -> restaurant::Model {
        restaurant::Model {
            id: Uuid::new_v4(),
            name: "Test Kitchen".into(),
            street: "Bole Road".into(),
            city: "Addis Ababa".into(),
            sub_city: Some("Bole".into()),
            latitude: 9.0054,
            longitude: 38.7636,
            flat_delivery_fee: d!(0),
            commission_rate: d!(0.15),
            is_partnered: true,
            happy_hour_enabled: false,
            happy_hour_percent: d!(0),
            happy_hour_days: None,
            happy_hour_start_date: None,
            happy_hour_end_date: None,
            happy_hour_start_time: None,
            happy_hour_end_time: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn off_peak_now() -> DateTime<Utc> {
        // A Tuesday at 09:00, outside both peak windows.
        Utc.with_ymd_and_hms(2026, 8, 4, 9, 0, 0).unwrap()
    }

    fn calculator() -> FeeCalculator {
        FeeCalculator::new(FeeConfig::default())
    }

    #[test]
    fn location_classification_rules() {
        let calc = calculator();
        assert_eq!(
            calc.classify_location("Addis Ababa", None),
            LocationType::Urban
        );
        assert_eq!(
            calc.classify_location("Bishoftu", Some("Kebele 02")),
            LocationType::Suburban
        );
        assert_eq!(calc.classify_location("Bishoftu", None), LocationType::Rural);
        assert_eq!(calc.classify_location("Bishoftu", Some("  ")), LocationType::Rural);
    }

    #[test]
    fn urban_four_km_off_peak_matches_expected_breakdown() {
        // base 15 + 4km x 20 = 95; above the 25 floor; no multipliers.
        let calc = calculator();
        let restaurant = test_restaurant();
        let quote = calc.quote(FeeInput {
            restaurant: &restaurant,
            delivery_city: "Addis Ababa",
            delivery_sub_city: None,
            distance_km: 4.0,
            subtotal: d!(200),
            now: off_peak_now(),
            active_orders: 0,
            available_drivers: 1,
        });
        assert_eq!(quote.location_type, LocationType::Urban);
        assert_eq!(quote.delivery_fee, d!(95.00));
        assert_eq!(quote.service_fee, d!(5.00));
        assert_eq!(quote.discount, d!(0));
    }

    #[test]
    fn fee_is_monotonic_in_distance() {
        let calc = calculator();
        let restaurant = test_restaurant();
        let mut last = Decimal::ZERO;
        for km in [0.5, 1.0, 2.5, 4.0, 8.0, 15.0] {
            let quote = calc.quote(FeeInput {
                restaurant: &restaurant,
                delivery_city: "Addis Ababa",
                delivery_sub_city: None,
                distance_km: km,
                subtotal: d!(100),
                now: off_peak_now(),
                active_orders: 0,
                available_drivers: 3,
            });
            assert!(quote.delivery_fee >= last, "fee decreased at {} km", km);
            assert!(quote.delivery_fee >= d!(25.00));
            last = quote.delivery_fee;
        }
    }

    #[test]
    fn minimum_floor_applies_to_short_trips() {
        let calc = calculator();
        let mut restaurant = test_restaurant();
        restaurant.flat_delivery_fee = d!(1);
        let quote = calc.quote(FeeInput {
            restaurant: &restaurant,
            delivery_city: "Addis Ababa",
            delivery_sub_city: None,
            distance_km: 0.1,
            subtotal: d!(50),
            now: off_peak_now(),
            active_orders: 0,
            available_drivers: 5,
        });
        assert_eq!(quote.delivery_fee, d!(25.00));
    }

    #[test]
    fn restaurant_flat_fee_replaces_base_term() {
        let calc = calculator();
        let mut restaurant = test_restaurant();
        restaurant.flat_delivery_fee = d!(40);
        let quote = calc.quote(FeeInput {
            restaurant: &restaurant,
            delivery_city: "Addis Ababa",
            delivery_sub_city: None,
            distance_km: 2.0,
            subtotal: d!(100),
            now: off_peak_now(),
            active_orders: 0,
            available_drivers: 2,
        });
        // 40 flat + 2 x 20 = 80, not 15 + 40 + 40.
        assert_eq!(quote.delivery_fee, d!(80.00));
    }

    #[test]
    fn peak_window_applies_percentage_bump() {
        let calc = calculator();
        let restaurant = test_restaurant();
        let lunch = Utc.with_ymd_and_hms(2026, 8, 4, 12, 30, 0).unwrap();
        let quote = calc.quote(FeeInput {
            restaurant: &restaurant,
            delivery_city: "Addis Ababa",
            delivery_sub_city: None,
            distance_km: 4.0,
            subtotal: d!(100),
            now: lunch,
            active_orders: 0,
            available_drivers: 2,
        });
        // 95 x 1.2 = 114.
        assert_eq!(quote.delivery_fee, d!(114.00));
    }

    #[test]
    fn zero_available_drivers_prices_at_max_surge() {
        let calc = calculator();
        let restaurant = test_restaurant();
        let quote = calc.quote(FeeInput {
            restaurant: &restaurant,
            delivery_city: "Addis Ababa",
            delivery_sub_city: None,
            distance_km: 4.0,
            subtotal: d!(100),
            now: off_peak_now(),
            active_orders: 0,
            available_drivers: 0,
        });
        // 95 x 2.0 max surge.
        assert_eq!(quote.delivery_fee, d!(190.00));
    }

    #[test]
    fn surge_tiers_apply_by_ratio() {
        let calc = calculator();
        let restaurant = test_restaurant();
        let fee_for = |active: u64, available: u64| {
            calc.quote(FeeInput {
                restaurant: &restaurant,
                delivery_city: "Addis Ababa",
                delivery_sub_city: None,
                distance_km: 4.0,
                subtotal: d!(100),
                now: off_peak_now(),
                active_orders: active,
                available_drivers: available,
            })
            .delivery_fee
        };
        assert_eq!(fee_for(1, 1), d!(95.00)); // ratio 1.0 < 1.5
        assert_eq!(fee_for(3, 2), d!(118.75)); // ratio 1.5 -> x1.25
        assert_eq!(fee_for(6, 2), d!(142.50)); // ratio 3.0 -> x1.5
    }

    #[test]
    fn happy_hour_requires_every_condition() {
        let calc = calculator();
        let mut restaurant = test_restaurant();
        let now = Utc.with_ymd_and_hms(2026, 8, 4, 18, 30, 0).unwrap(); // Tuesday

        // Disabled -> zero.
        assert_eq!(calc.happy_hour_discount(&restaurant, d!(200), now), d!(0));

        restaurant.happy_hour_enabled = true;
        restaurant.happy_hour_percent = d!(10);
        restaurant.happy_hour_days = Some("tue,wed".into());
        restaurant.happy_hour_start_time = Some("18:00".into());
        restaurant.happy_hour_end_time = Some("20:00".into());
        assert_eq!(
            calc.happy_hour_discount(&restaurant, d!(200), now),
            d!(20.00)
        );

        // Wrong day.
        restaurant.happy_hour_days = Some("mon".into());
        assert_eq!(calc.happy_hour_discount(&restaurant, d!(200), now), d!(0));

        // Outside date range.
        restaurant.happy_hour_days = Some("tue".into());
        restaurant.happy_hour_end_date =
            Some(chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        assert_eq!(calc.happy_hour_discount(&restaurant, d!(200), now), d!(0));
    }

    #[test]
    fn happy_hour_window_may_wrap_midnight() {
        let calc = calculator();
        let mut restaurant = test_restaurant();
        restaurant.happy_hour_enabled = true;
        restaurant.happy_hour_percent = d!(15);
        restaurant.happy_hour_start_time = Some("22:00".into());
        restaurant.happy_hour_end_time = Some("02:00".into());

        let before_midnight = Utc.with_ymd_and_hms(2026, 8, 4, 23, 0, 0).unwrap();
        let after_midnight = Utc.with_ymd_and_hms(2026, 8, 5, 1, 0, 0).unwrap();
        let outside = Utc.with_ymd_and_hms(2026, 8, 4, 12, 0, 0).unwrap();

        assert_eq!(
            calc.happy_hour_discount(&restaurant, d!(100), before_midnight),
            d!(15.00)
        );
        assert_eq!(
            calc.happy_hour_discount(&restaurant, d!(100), after_midnight),
            d!(15.00)
        );
        assert_eq!(calc.happy_hour_discount(&restaurant, d!(100), outside), d!(0));
    }

    #[test]
    fn money_rounds_half_up_at_each_boundary() {
        assert_eq!(round_money(d!(1.005)), d!(1.01));
        assert_eq!(round_money(d!(2.344)), d!(2.34));
        assert_eq!(round_money(d!(2.345)), d!(2.35));
    }
}

//! Затухание звука в воде и во взвеси.
//!
//! Вода: модель Francois & Garrison (1982), три релаксационных члена
//! (борная кислота, MgSO₄, чистая вода). Взвесь: вязкое затухание по
//! Urick плюс рассеяние по Thorne & Meral. Все функции возвращают дБ/м.

/// Перевод неперов в децибелы: `20·log10(e)`.
const NEPER_TO_DB: f64 = 8.686;

/// Свойства воды для расчёта затухания.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaterProperties {
    /// °C
    pub temperature: f64,
    /// PSU
    pub salinity: f64,
    /// м
    pub depth: f64,
    pub ph: f64,
}

/// Свойства взвешенных частиц.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SedimentProperties {
    /// Диаметр частицы, м
    pub diameter: f64,
    /// Плотность частицы, кг/м³
    pub density: f64,
    /// Массовая концентрация, кг/м³
    pub concentration: f64,
}

/// Скорость звука, м/с (приближение, входящее в модель Francois–Garrison).
pub fn sound_speed(
    temperature: f64,
    salinity: f64,
    depth: f64,
) -> f64 {
    1412.0 + 3.21 * temperature + 1.19 * salinity + 0.0167 * depth
}

/// Плотность морской воды у поверхности по UNESCO EOS-80, кг/м³.
pub fn water_density(
    temperature: f64,
    salinity: f64,
) -> f64 {
    let t = temperature;
    let s = salinity;

    let rho_w = 999.842594 + 6.793952e-2 * t - 9.095290e-3 * t.powi(2) + 1.001685e-4 * t.powi(3)
        - 1.120083e-6 * t.powi(4)
        + 6.536336e-9 * t.powi(5);

    let a = 8.24493e-1 - 4.0899e-3 * t + 7.6438e-5 * t.powi(2) - 8.2467e-7 * t.powi(3)
        + 5.3875e-9 * t.powi(4);
    let b = -5.72466e-3 + 1.0227e-4 * t - 1.6546e-6 * t.powi(2);
    let c = 4.8314e-4;

    rho_w + a * s + b * s.powf(1.5) + c * s.powi(2)
}

/// Кинематическая вязкость воды, м²/с.
pub fn kinematic_viscosity(temperature: f64) -> f64 {
    let t = temperature;
    1.79e-6 / (1.0 + 0.0337 * t + 0.000221 * t * t)
}

/// Коэффициент затухания в воде, дБ/м.
pub fn water_absorption(
    frequency_khz: f64,
    water: &WaterProperties,
) -> f64 {
    let WaterProperties {
        temperature: t,
        salinity: s,
        depth: d,
        ph,
    } = *water;
    let f2 = frequency_khz * frequency_khz;
    let c = sound_speed(t, s, d);
    let theta = t + 273.0;

    // Борная кислота
    let a1 = 8.86 / c * 10f64.powf(0.78 * ph - 5.0);
    let fr1 = 2.8 * (s / 35.0).sqrt() * 10f64.powf(4.0 - 1245.0 / theta);
    let boric = a1 * fr1 * f2 / (fr1 * fr1 + f2);

    // Сульфат магния
    let a2 = 21.44 * s / c * (1.0 + 0.025 * t);
    let p2 = 1.0 - 1.37e-4 * d + 6.2e-9 * d * d;
    let fr2 = 8.17 * 10f64.powf(8.0 - 1990.0 / theta) / (1.0 + 0.0018 * (s - 35.0));
    let mgso4 = a2 * p2 * fr2 * f2 / (fr2 * fr2 + f2);

    // Чистая вода
    let a3 = if t <= 20.0 {
        4.937e-4 - 2.59e-5 * t + 9.11e-7 * t.powi(2) - 1.50e-8 * t.powi(3)
    } else {
        3.964e-4 - 1.146e-5 * t + 1.45e-7 * t.powi(2) - 6.5e-10 * t.powi(3)
    };
    let p3 = 1.0 - 3.83e-5 * d + 4.9e-10 * d * d;
    let pure = a3 * p3 * f2;

    (boric + mgso4 + pure) / 1000.0
}

/// Коэффициент затухания во взвеси, дБ/м.
///
/// Частицы считаются сферами радиуса `a = d/2`; `ρw`: плотность воды.
pub fn sediment_absorption(
    frequency_khz: f64,
    sediment: &SedimentProperties,
    water_density: f64,
    water: &WaterProperties,
) -> f64 {
    if sediment.concentration <= 0.0 || sediment.diameter <= 0.0 {
        return 0.0;
    }

    let omega = 2.0 * std::f64::consts::PI * frequency_khz * 1000.0;
    let k = omega / sound_speed(water.temperature, water.salinity, water.depth);
    let a = sediment.diameter / 2.0;
    let m = sediment.concentration;
    let rho_s = sediment.density;

    // Вязкий член
    let nu = kinematic_viscosity(water.temperature);
    let beta = (omega / (2.0 * nu)).sqrt();
    let sigma = rho_s / water_density;
    let delta = 0.5 * (1.0 + 9.0 / (2.0 * beta * a));
    let s = 9.0 / (4.0 * beta * a) * (1.0 + 1.0 / (beta * a));
    let viscous = k * (sigma - 1.0).powi(2) / 2.0 * s / (s * s + (sigma + delta).powi(2)) * m / rho_s;

    // Рассеяние
    let x = k * a;
    let chi = 0.29 * x.powi(4) / (0.95 + 1.28 * x * x + 0.25 * x.powi(4));
    let scattering = 3.0 * m * chi / (4.0 * a * rho_s);

    NEPER_TO_DB * (viscous + scattering)
}

use btx_flash::{FlashResult, FlashUnit, PropertyPackage};
use quantity::{JOULE, KELVIN, MOL, PASCAL};

mod estimation;
mod flash;
mod parameters;

/// Equimolar benzene/toluene flash at 368 K and 1 atm with the NRTL
/// parameters of the property package fixed.
fn equimolar_flash(temperature: f64) -> FlashResult<FlashUnit> {
    let mut flash = FlashUnit::new(PropertyPackage::btx());
    flash.fix_inlet(
        1.0 * MOL,
        temperature * KELVIN,
        101325.0 * PASCAL,
        &[0.5, 0.5],
    )?;
    flash.fix_heat_duty(0.0 * JOULE);
    flash.fix_deltap(0.0 * PASCAL);

    let properties = &mut flash.properties;
    properties.alpha_mut("benzene", "benzene")?.fix(0.0);
    properties.alpha_mut("benzene", "toluene")?.fix(0.3);
    properties.alpha_mut("toluene", "toluene")?.fix(0.0);
    properties.alpha_mut("toluene", "benzene")?.fix(0.3);
    properties.tau_mut("benzene", "benzene")?.fix(0.0);
    properties.tau_mut("benzene", "toluene")?.fix(0.1690);
    properties.tau_mut("toluene", "toluene")?.fix(0.0);
    properties.tau_mut("toluene", "benzene")?.fix(-0.1559);
    Ok(flash)
}

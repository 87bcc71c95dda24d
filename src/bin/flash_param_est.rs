//! Flash of an equimolar benzene/toluene feed followed by a fit of the
//! NRTL `tau` parameters to one measured vapor/liquid composition.
//!
//! Usage: `flash_param_est [pure_records.json binary_records.json]`
use btx_flash::{
    FlashResult, FlashUnit, IdentifierOption, Loss, ParameterEstimation, PropertyPackage,
    SolverOptions, Verbosity, VleData,
};
use quantity::{JOULE, KELVIN, MOL, PASCAL};
use std::env;

fn property_package() -> FlashResult<PropertyPackage> {
    let args: Vec<String> = env::args().skip(1).collect();
    match args.as_slice() {
        [pure, binary] => PropertyPackage::from_json(
            &["benzene", "toluene"],
            pure,
            Some(binary),
            IdentifierOption::Name,
        ),
        _ => Ok(PropertyPackage::btx()),
    }
}

fn main() -> FlashResult<()> {
    let mut flash = FlashUnit::new(property_package()?);
    println!("Degrees of Freedom = {}", flash.degrees_of_freedom());

    flash.fix_inlet(1.0 * MOL, 368.0 * KELVIN, 101325.0 * PASCAL, &[0.5, 0.5])?;
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
    println!("Degrees of Freedom = {}", flash.degrees_of_freedom());

    let options = SolverOptions::new().verbosity(Verbosity::Result);
    flash.initialize(options)?;
    let status = flash.solve(SolverOptions::new().verbosity(Verbosity::Iter))?;
    println!("{status:?}");
    flash.report();

    // parameter estimation
    let data = VleData::new("benzene", 0.631425, 0.40906);
    let estimation = ParameterEstimation::new(data, Loss::Linear);

    for (i, j) in [("benzene", "toluene"), ("toluene", "benzene")] {
        let tau = flash.properties.tau_mut(i, j)?;
        tau.unfix();
        tau.setlb(-5.0);
        tau.setub(5.0);
    }
    println!("{}", flash.degrees_of_freedom());

    let status = estimation.solve(&mut flash, SolverOptions::new().verbosity(Verbosity::Iter))?;
    println!("{status}");
    flash.report();
    println!("{}", flash.properties.nrtl);
    Ok(())
}

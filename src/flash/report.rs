use super::FlashUnit;
use crate::variable::Var;
use quantity::{KELVIN, MOL, PASCAL};
use std::fmt;

const WIDTH: usize = 84;

impl FlashUnit {
    /// Print the unit performance and the stream table.
    pub fn report(&self) {
        println!("{self}");
    }
}

fn performance_row(f: &mut fmt::Formatter<'_>, key: &str, var: &Var) -> fmt::Result {
    let (lower, upper) = var.bounds();
    let bound = |b: f64| {
        if b.is_finite() {
            format!("{b}")
        } else {
            "None".into()
        }
    };
    writeln!(
        f,
        "    {:>15} : {:>11.4} : {:>5} : ({}, {})",
        key,
        var.value(),
        if var.is_fixed() { "True" } else { "False" },
        bound(lower),
        bound(upper)
    )
}

impl fmt::Display for FlashUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:=<WIDTH$}", "")?;
        writeln!(f, "Unit : flash")?;
        writeln!(f, "{:-<WIDTH$}", "")?;
        writeln!(f, "    Unit Performance\n")?;
        writeln!(f, "    Variables: \n")?;
        writeln!(f, "    {:>15} : {:>11} : {:>5} : Bounds", "Key", "Value", "Fixed")?;
        performance_row(f, "Heat Duty", &self.heat_duty)?;
        performance_row(f, "Pressure Change", &self.deltap)?;
        writeln!(f)?;
        writeln!(f, "{:-<WIDTH$}", "")?;
        writeln!(f, "    Stream Table")?;
        writeln!(
            f,
            "    {:<28} {:>14} {:>14} {:>14}",
            "", "Inlet", "Vapor Outlet", "Liquid Outlet"
        )?;

        let cell = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{v:.5}"));
        let outlets = [self.vap_outlet().ok(), self.liq_outlet().ok()];
        let row = |f: &mut fmt::Formatter<'_>, name: &str, inlet: f64, outlet: &dyn Fn(usize) -> Option<f64>| {
            writeln!(
                f,
                "    {:<28} {:>14} {:>14} {:>14}",
                name,
                cell(Some(inlet)),
                cell(outlet(0)),
                cell(outlet(1))
            )
        };

        row(f, "flow_mol", self.inlet.flow_mol.value(), &|k| {
            outlets[k].as_ref().map(|o| o.flow.convert_into(MOL))
        })?;
        for (i, name) in self.properties.component_names().into_iter().enumerate() {
            row(
                f,
                &format!("mole_frac_comp {name}"),
                self.inlet.mole_frac_comp[i].value(),
                &|k| outlets[k].as_ref().map(|o| o.molefracs[i]),
            )?;
        }
        row(f, "temperature", self.inlet.temperature.value(), &|k| {
            outlets[k].as_ref().map(|o| o.temperature.convert_into(KELVIN))
        })?;
        row(f, "pressure", self.inlet.pressure.value(), &|k| {
            outlets[k].as_ref().map(|o| o.pressure.convert_into(PASCAL))
        })?;
        write!(f, "{:=<WIDTH$}", "")
    }
}

#[cfg(test)]
mod tests {
    use crate::{FlashUnit, PropertyPackage, SolverOptions};

    #[test]
    fn report_without_solution() {
        let flash = FlashUnit::new(PropertyPackage::btx());
        let report = flash.to_string();
        assert!(report.contains("Heat Duty"));
        assert!(report.contains("mole_frac_comp toluene"));
        assert!(report.contains(" - "));
    }

    #[test]
    fn report_after_solve() -> crate::FlashResult<()> {
        let mut flash = FlashUnit::new(PropertyPackage::btx());
        flash.inlet.flow_mol.fix(1.0);
        flash.inlet.temperature.fix(368.0);
        flash.inlet.pressure.fix(101325.0);
        flash.mole_frac_comp_mut("benzene")?.fix(0.5);
        flash.mole_frac_comp_mut("toluene")?.fix(0.5);
        flash.heat_duty.fix(0.0);
        flash.deltap.fix(0.0);
        flash.properties.nrtl.fix_all();
        flash.solve(SolverOptions::default())?;
        let report = flash.to_string();
        assert!(!report.contains(" - "));
        assert!(report.contains("368.00000"));
        Ok(())
    }
}
